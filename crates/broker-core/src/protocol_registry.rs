use rf_hardware::{DecodeOutcome, EncodeOutcome, ProtocolDescriptor};

/// Frozen-after-init adapter over the set of registered protocols (§4.2).
/// Holds no lock: the registry is built once at startup and never mutated,
/// so concurrent reads from the decoder/sender/session workers are safe
/// (§5 shared-resource policy).
pub struct ProtocolRegistry {
    protocols: Vec<ProtocolDescriptor>,
    min_raw: usize,
    max_raw: usize,
    min_gap: u32,
    max_gap: u32,
}

impl ProtocolRegistry {
    pub fn new(protocols: Vec<ProtocolDescriptor>) -> Self {
        let min_raw = protocols.iter().map(|p| p.min_raw).min().unwrap_or(0);
        let max_raw = protocols.iter().map(|p| p.max_raw).max().unwrap_or(0);
        let min_gap = protocols.iter().map(|p| p.min_gap).min().unwrap_or(0);
        let max_gap = protocols.iter().map(|p| p.max_gap).max().unwrap_or(0);
        Self {
            protocols,
            min_raw,
            max_raw,
            min_gap,
            max_gap,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtocolDescriptor> {
        self.protocols.iter()
    }

    pub fn lookup_by_name(&self, id: &str) -> Option<&ProtocolDescriptor> {
        self.protocols.iter().find(|p| p.id == id)
    }

    /// Union bounds over every registered protocol, used by the receive
    /// pipeline to frame captures (§4.2).
    pub fn union_raw_len_bounds(&self) -> (usize, usize) {
        (self.min_raw, self.max_raw)
    }

    pub fn union_gap_bounds(&self) -> (u32, u32) {
        (self.min_gap, self.max_gap)
    }

    /// A frame matches a protocol iff hwtype is compatible and its length
    /// fits within the protocol's raw-length bounds (§3 invariants).
    pub fn compatible_protocols<'a>(
        &'a self,
        frame: &'a broker_protocol::PulseFrame,
    ) -> impl Iterator<Item = &'a ProtocolDescriptor> + 'a {
        self.protocols.iter().filter(move |p| {
            p.has_decoder()
                && frame.hwtype_compatible(p.hwtype)
                && frame.len() >= p.min_raw
                && frame.len() <= p.max_raw
        })
    }

    pub fn decode(
        &self,
        protocol: &ProtocolDescriptor,
        frame: &broker_protocol::PulseFrame,
    ) -> DecodeOutcome {
        match &protocol.decoder {
            Some(decoder) => decoder.decode(frame),
            None => DecodeOutcome::NoMatch,
        }
    }

    pub fn encode(&self, id: &str, code: &serde_json::Value) -> Option<EncodeOutcome> {
        let protocol = self.lookup_by_name(id)?;
        protocol.encoder.as_ref()?.encode(code)
    }
}

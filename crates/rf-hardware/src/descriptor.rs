use std::sync::Arc;

use crate::{ProtocolDecoder, ProtocolEncoder};

/// Kind of a named option slot in a protocol's schema (§3 `optionSchema`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSlotKind {
    Id,
    Value,
    Setting,
    State,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValueKind {
    Number,
    String,
}

#[derive(Debug, Clone)]
pub struct OptionSlot {
    pub name: String,
    pub kind: OptionSlotKind,
    pub value_kind: OptionValueKind,
}

/// Process-wide, immutable-after-registration capability record for one
/// protocol (§3 `ProtocolDescriptor`, §4.2). Holding `Option<Arc<dyn ...>>`
/// directly is this crate's idiomatic substitute for the original's boolean
/// `hasDecode`/`hasEncode` flags plus a side-channel function pointer table.
#[derive(Clone)]
pub struct ProtocolDescriptor {
    pub id: String,
    pub hwtype: i32,
    pub rxrpt: u32,
    pub txrpt: u32,
    pub min_raw: usize,
    pub max_raw: usize,
    pub min_gap: u32,
    pub max_gap: u32,
    pub option_schema: Vec<OptionSlot>,
    pub decoder: Option<Arc<dyn ProtocolDecoder>>,
    pub encoder: Option<Arc<dyn ProtocolEncoder>>,
}

impl ProtocolDescriptor {
    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn accepts_any_hwtype(&self) -> bool {
        self.hwtype == broker_protocol::HWTYPE_ANY
    }
}

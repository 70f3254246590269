use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(CampaignId);
id_newtype!(NarrationEntryId);
id_newtype!(SessionId);

impl CampaignId {
    /// Campaign identifiers assigned by the backend are strictly positive.
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// Upper bound the backend enforces on campaign names.
pub const CAMPAIGN_NAME_MAX_LEN: usize = 255;

//! # Status
//!
//! Status of the `Cryostat` resource.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CryostatStatus {
    /// External URL of the Cryostat web application. Empty until exposure resolves.
    #[serde(default)]
    pub application_url: String,
}

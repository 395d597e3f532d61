use serde::{Deserialize, Serialize};

use crate::job::JobDef;
use crate::request::RequestDef;
use crate::settings::GlobalSettings;

/// Top-level connector definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDef {
  #[serde(default)]
  pub global_settings: GlobalSettings,
  #[serde(default)]
  pub requests: Vec<RequestDef>,
  #[serde(default)]
  pub jobs: Vec<JobDef>,
}

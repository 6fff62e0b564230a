//! C5: the extension provisioner. Allocates and reconciles `VoipExtension`
//! rows with PJSIP endpoint state on the PBX, via `pbx-mi`'s AstDB
//! primitives (`db_put`/`db_del_tree`/`reload`/`send_cli`).

mod config;
mod error;
mod provisioner;
mod status;

pub use config::ProvisionerConfig;
pub use error::{ProvisionerError, Result};
pub use provisioner::ExtensionProvisioner;
pub use status::{ContactState, ExtensionStatus};

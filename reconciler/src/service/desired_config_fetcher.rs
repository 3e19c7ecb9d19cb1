//! Desired config resolution

use serde_json::json;

use crate::domain::desired_config::DesiredConfig;
use crate::domain::workspace::Workspace;
use crate::error::Result;
use crate::infra::logger::ReconcileLogger;
use crate::service::desired_config_generator::DesiredConfigGenerator;

/// Resolve and validate the desired config for a workspace.
///
/// A persisted agentk state wins; the generator is only consulted when
/// there is none.
pub fn fetch(
    workspace: &Workspace,
    generator: &dyn DesiredConfigGenerator,
    logger: &dyn ReconcileLogger,
) -> Result<DesiredConfig> {
    let desired_config = match &workspace.workspace_agentk_state {
        Some(agentk_state) => {
            logger.debug(
                "Using desired config from workspace agentk state",
                json!({ "workspace_id": workspace.id }),
            );
            DesiredConfig::from_value(agentk_state.desired_config.clone())?
        }
        None => {
            logger.debug(
                "Generating desired config",
                json!({ "workspace_id": workspace.id }),
            );
            DesiredConfig::new(generator.generate(workspace)?)
        }
    };

    desired_config.validate()?;
    Ok(desired_config)
}

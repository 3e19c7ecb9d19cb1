//! Assembles the response payload for one reconciliation round

use crate::domain::desired_config::DesiredConfig;
use crate::domain::types::{
    RailsInfoObservability, ReconcileContext, ResourcesIncluded, ResponsePayload, UpdateType,
    WorkspaceRailsInfo,
};
use crate::domain::workspace::Workspace;
use crate::error::Result;
use crate::infra::logger::ReconcileLogger;
use crate::infra::yaml_stream::to_yaml_stream;
use crate::service::desired_config_generator::DesiredConfigGenerator;
use crate::service::{config_to_apply_builder, desired_config_fetcher, shadow_run_handler};

/// Whether to ship everything and how the round is classified
pub fn resources_to_include(
    update_type: UpdateType,
    workspace: &Workspace,
) -> (bool, ResourcesIncluded) {
    let include_all_resources = update_type == UpdateType::Full
        || workspace.force_include_all_resources
        || workspace.actual_state_updated_more_recently_than_last_response_to_agent();

    let resources_included = if include_all_resources {
        ResourcesIncluded::AllResourcesIncluded
    } else if workspace.desired_state_updated_more_recently_than_last_response_to_agent()
        || workspace.desired_state_terminated_and_actual_state_not_terminated()
    {
        ResourcesIncluded::PartialResourcesIncluded
    } else {
        ResourcesIncluded::NoResourcesIncluded
    };

    (include_all_resources, resources_included)
}

/// Fill in `response_payload` and `observability_for_rails_infos`.
///
/// An invalid desired config fails the whole batch.
pub fn build(
    mut context: ReconcileContext,
    generator: &dyn DesiredConfigGenerator,
    logger: &dyn ReconcileLogger,
) -> Result<ReconcileContext> {
    let mut workspace_rails_infos = Vec::with_capacity(context.workspaces_to_be_returned.len());

    for workspace in &context.workspaces_to_be_returned {
        let (include_all_resources, resources_included) =
            resources_to_include(context.update_type, workspace);

        let config_to_apply = match resources_included {
            ResourcesIncluded::NoResourcesIncluded => None,
            _ => Some(config_to_apply_yaml(
                workspace,
                include_all_resources,
                generator,
                logger,
            )?),
        };

        context.observability_for_rails_infos.insert(
            workspace.name.clone(),
            RailsInfoObservability {
                config_to_apply_resources_included: resources_included,
            },
        );

        workspace_rails_infos.push(WorkspaceRailsInfo {
            name: workspace.name.clone(),
            namespace: workspace.namespace.clone(),
            deployment_resource_version: workspace.deployment_resource_version.clone(),
            desired_state: workspace.desired_state,
            actual_state: workspace.actual_state,
            image_pull_secrets: workspace.workspaces_agent_config.image_pull_secrets.clone(),
            config_to_apply,
        });
    }

    context.response_payload = Some(ResponsePayload {
        workspace_rails_infos,
        settings: context.settings,
    });
    Ok(context)
}

fn config_to_apply_yaml(
    workspace: &Workspace,
    include_all_resources: bool,
    generator: &dyn DesiredConfigGenerator,
    logger: &dyn ReconcileLogger,
) -> Result<String> {
    let desired_config = desired_config_fetcher::fetch(workspace, generator, logger)?;
    let new_config_to_apply_array =
        config_to_apply_builder::build(workspace, include_all_resources, &desired_config);

    let new_config_to_apply = DesiredConfig::new(new_config_to_apply_array);
    new_config_to_apply.validate()?;

    let config_to_apply = DesiredConfig::new(shadow_run_handler::handle(
        workspace,
        new_config_to_apply.into_array(),
        logger,
        include_all_resources,
    ));
    config_to_apply.validate()?;

    to_yaml_stream(config_to_apply.desired_config_array())
}

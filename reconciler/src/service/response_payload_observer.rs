//! Logs the verified response payload

use serde_json::{json, Value};

use crate::domain::types::ReconcileContext;
use crate::infra::logger::ReconcileLogger;

const REDACTED: &str = "<redacted>";

/// Emit one debug line describing the response payload.
///
/// `config_to_apply` is redacted unless the context asks to observe it.
pub fn observe(context: &ReconcileContext, logger: &dyn ReconcileLogger) {
    let workspace_rails_infos: Vec<Value> = context
        .response_payload
        .iter()
        .flat_map(|payload| payload.workspace_rails_infos.iter())
        .map(|info| {
            let mut value = serde_json::to_value(info).unwrap_or(Value::Null);
            if !context.observe_config_to_apply {
                if let Some(object) = value.as_object_mut() {
                    if object.contains_key("config_to_apply") {
                        object.insert("config_to_apply".to_string(), json!(REDACTED));
                    }
                }
            }
            value
        })
        .collect();

    logger.debug(
        "Returning verified response_payload",
        json!({
            "agent_id": context.agent_id,
            "update_type": context.update_type.as_str(),
            "response_payload": {
                "workspace_rails_info_count": workspace_rails_infos.len(),
                "workspace_rails_infos": workspace_rails_infos,
            },
            "observability_for_rails_infos": context.observability_for_rails_infos,
        }),
    );
}

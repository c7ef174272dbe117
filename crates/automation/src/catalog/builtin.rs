use super::schema::{ConfigSchema, FieldKind};
use super::{ActionCategory, ActionTypeDescriptor};

pub(super) fn descriptors() -> Vec<ActionTypeDescriptor> {
    vec![
        ActionTypeDescriptor::new("condition", ActionCategory::Condition)
            .describe("Compare a field of the triggering entity against a value")
            .with_schema(
                ConfigSchema::new()
                    .required("field", FieldKind::String)
                    .described("dot path into the entity payload")
                    .required(
                        "operator",
                        FieldKind::one_of(["eq", "ne", "gt", "gte", "lt", "lte", "contains", "exists"]),
                    )
                    .optional("value", FieldKind::Any),
            )
            .with_ports(["true", "false"]),
        ActionTypeDescriptor::new("check_inventory", ActionCategory::Inventory)
            .describe("Branch on whether on-hand quantity meets a minimum")
            .with_schema(
                ConfigSchema::new()
                    .required("quantity_field", FieldKind::String)
                    .described("dot path to the on-hand quantity in the entity payload")
                    .required("minimum", FieldKind::Number),
            )
            .with_ports(["sufficient", "insufficient"]),
        ActionTypeDescriptor::new("fulfill_order", ActionCategory::Inventory)
            .describe("Mark the referenced order as ready for fulfilment")
            .with_schema(ConfigSchema::new().optional("order_field", FieldKind::String)),
        ActionTypeDescriptor::new("send_notification", ActionCategory::Notification)
            .describe("Notify a list of recipients using a message template")
            .with_schema(
                ConfigSchema::new()
                    .required("recipients", FieldKind::Array)
                    .required("template", FieldKind::String)
                    .optional("channel", FieldKind::one_of(["email", "sms", "in_app"])),
            ),
        ActionTypeDescriptor::new("create_alert", ActionCategory::Alert)
            .describe("Raise an operational alert")
            .with_schema(
                ConfigSchema::new()
                    .required("severity", FieldKind::one_of(["info", "warning", "critical"]))
                    .required("message", FieldKind::String),
            ),
        ActionTypeDescriptor::new("audit_log", ActionCategory::Audit)
            .describe("Write an audit entry about the triggering entity")
            .with_schema(ConfigSchema::new().required("message", FieldKind::String)),
        ActionTypeDescriptor::new("update_field", ActionCategory::Data)
            .describe("Set a field on the triggering entity")
            .with_schema(
                ConfigSchema::new()
                    .required("field", FieldKind::String)
                    .required("value", FieldKind::Any),
            ),
        ActionTypeDescriptor::new("webhook", ActionCategory::Integration)
            .describe("Call an external HTTP endpoint")
            .with_schema(
                ConfigSchema::new()
                    .required("url", FieldKind::String)
                    .optional("method", FieldKind::one_of(["GET", "POST", "PUT"]))
                    .optional("headers", FieldKind::Object),
            ),
    ]
}

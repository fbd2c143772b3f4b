//! MCP server implementation and tool dispatcher
//!
//! Tools are declared in [`crate::catalog`] rather than through `#[tool]`
//! attributes: schemas come from one static table, and argument failures are
//! reported as error envelopes (`isError: true`) instead of protocol errors.
//! Every call follows the same path: catalog lookup, argument validation, one
//! controller operation, result rendering.

use std::sync::Arc;
use std::time::Instant;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;

use crate::applescript::{Osascript, ScriptRunner};
use crate::args::ToolArgs;
use crate::bridge::duration_ms;
use crate::catalog::{self, CATALOG};
use crate::errors::{AppError, AppResult};
use crate::mail::MailController;
use crate::models::{OperationResult, ResponseEnvelope, RuleActions, RuleCondition, ToolDescriptor};

/// Apple Mail MCP server
///
/// Generic over the script runner so tests can drive the full dispatch path
/// without Mail.
pub struct AppleMailServer<R = Osascript> {
    mail: MailController<R>,
    /// MCP tool list, converted from the catalog once
    tools: Arc<[Tool]>,
}

impl<R> Clone for AppleMailServer<R> {
    fn clone(&self) -> Self {
        Self {
            mail: self.mail.clone(),
            tools: Arc::clone(&self.tools),
        }
    }
}

impl<R: ScriptRunner> AppleMailServer<R> {
    pub fn new(mail: MailController<R>) -> Self {
        Self {
            mail,
            tools: CATALOG.iter().map(mcp_tool).collect(),
        }
    }

    /// The advertised tool list
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.to_vec()
    }

    /// Run one tool call and wrap the outcome in an envelope
    ///
    /// Never fails: every error becomes an envelope with `is_error` set.
    pub async fn dispatch(&self, name: &str, arguments: &JsonObject) -> ResponseEnvelope {
        let started = Instant::now();
        let result = self.call(name, arguments).await;
        finalize_tool(name, started, result)
    }

    async fn call(&self, name: &str, arguments: &JsonObject) -> AppResult<String> {
        let descriptor = catalog::find(name)
            .ok_or_else(|| AppError::invalid(format!("Unknown tool: {name}")))?;
        let args = ToolArgs::validate(descriptor, arguments)?;
        self.route(descriptor, &args).await?.render()
    }

    async fn route(&self, tool: &ToolDescriptor, args: &ToolArgs) -> AppResult<OperationResult> {
        let mail = &self.mail;
        let result = match tool.name {
            // Accounts
            "list_accounts" => OperationResult::records(mail.list_accounts().await?),
            "get_account_info" => {
                OperationResult::Object(mail.account_info(&args.text("account_name")?).await?)
            }

            // Mailboxes
            "list_mailboxes" => OperationResult::records(
                mail.list_mailboxes(args.opt_text("account_name").as_deref())
                    .await?,
            ),
            "create_mailbox" => OperationResult::Text(
                mail.create_mailbox(&args.text("name")?, &args.text("account_name")?)
                    .await?,
            ),
            "delete_mailbox" => OperationResult::Text(
                mail.delete_mailbox(&args.text("name")?, &args.text("account_name")?)
                    .await?,
            ),

            // Reading
            "list_emails" => OperationResult::records(
                mail.list_emails(
                    &args.text("mailbox")?,
                    &args.text("account_name")?,
                    args.opt_integer("limit"),
                )
                .await?,
            ),
            "get_email" => {
                let (id, mailbox, account) = message_args(args)?;
                OperationResult::Object(mail.get_email(&id, &mailbox, &account).await?)
            }
            "search_emails" => OperationResult::records(
                mail.search_emails(
                    &args.text("query")?,
                    &args.text("mailbox")?,
                    &args.text("account_name")?,
                    args.opt_integer("limit"),
                )
                .await?,
            ),
            "get_unread_count" => {
                let count = mail
                    .unread_count(
                        args.opt_text("mailbox").as_deref(),
                        args.opt_text("account_name").as_deref(),
                    )
                    .await?;
                OperationResult::Text(format!("Unread count: {count}"))
            }

            // Actions
            "mark_read" => {
                let (id, mailbox, account) = message_args(args)?;
                let read = args.boolean("read")?;
                OperationResult::Text(mail.mark_read(&id, &mailbox, &account, read).await?)
            }
            "flag_email" => {
                let (id, mailbox, account) = message_args(args)?;
                let flagged = args.boolean("flagged")?;
                OperationResult::Text(mail.flag_email(&id, &mailbox, &account, flagged).await?)
            }
            "move_email" => OperationResult::Text(
                mail.move_email(
                    &args.text("id")?,
                    &args.text("from_mailbox")?,
                    &args.text("to_mailbox")?,
                    &args.text("account_name")?,
                )
                .await?,
            ),
            "copy_email" => OperationResult::Text(
                mail.copy_email(
                    &args.text("id")?,
                    &args.text("from_mailbox")?,
                    &args.text("to_mailbox")?,
                    &args.text("account_name")?,
                )
                .await?,
            ),
            "delete_email" => {
                let (id, mailbox, account) = message_args(args)?;
                OperationResult::Text(mail.delete_email(&id, &mailbox, &account).await?)
            }
            "set_flag_color" => {
                let (id, mailbox, account) = message_args(args)?;
                let index = args.integer("color_index")?;
                OperationResult::Text(mail.set_flag_color(&id, &mailbox, &account, index).await?)
            }
            "set_background_color" => {
                let (id, mailbox, account) = message_args(args)?;
                let color = args.text("color")?;
                OperationResult::Text(
                    mail.set_background_color(&id, &mailbox, &account, &color)
                        .await?,
                )
            }
            "mark_as_junk" => {
                let (id, mailbox, account) = message_args(args)?;
                let is_junk = args.boolean("is_junk")?;
                OperationResult::Text(mail.mark_as_junk(&id, &mailbox, &account, is_junk).await?)
            }

            // Compose
            "compose_email" => OperationResult::Text(
                mail.compose_email(
                    &args.text_list("to")?,
                    &args.text("subject")?,
                    &args.text("body")?,
                    &args.opt_text_list("cc").unwrap_or_default(),
                    &args.opt_text_list("bcc").unwrap_or_default(),
                )
                .await?,
            ),
            "reply_email" => {
                let (id, mailbox, account) = message_args(args)?;
                let body = args.text("body")?;
                let reply_all = args.opt_boolean("reply_all").unwrap_or(false);
                OperationResult::Text(
                    mail.reply_email(&id, &mailbox, &account, &body, reply_all)
                        .await?,
                )
            }
            "forward_email" => {
                let (id, mailbox, account) = message_args(args)?;
                let to = args.text_list("to")?;
                let body = args.opt_text("body");
                OperationResult::Text(
                    mail.forward_email(&id, &mailbox, &account, &to, body.as_deref())
                        .await?,
                )
            }
            "redirect_email" => {
                let (id, mailbox, account) = message_args(args)?;
                let to = args.text_list("to")?;
                OperationResult::Text(mail.redirect_email(&id, &mailbox, &account, &to).await?)
            }
            "list_drafts" => {
                OperationResult::records(mail.list_drafts(&args.text("account_name")?).await?)
            }
            "create_draft" => OperationResult::Text(
                mail.create_draft(
                    &args.text_list("to")?,
                    &args.text("subject")?,
                    &args.text("body")?,
                )
                .await?,
            ),

            // Message details
            "get_email_headers" => {
                let (id, mailbox, account) = message_args(args)?;
                OperationResult::Text(mail.email_headers(&id, &mailbox, &account).await?)
            }
            "get_email_source" => {
                let (id, mailbox, account) = message_args(args)?;
                OperationResult::Text(mail.email_source(&id, &mailbox, &account).await?)
            }
            "get_email_metadata" => {
                let (id, mailbox, account) = message_args(args)?;
                OperationResult::Object(mail.email_metadata(&id, &mailbox, &account).await?)
            }

            // Attachments
            "list_attachments" => {
                let (id, mailbox, account) = message_args(args)?;
                OperationResult::records(mail.list_attachments(&id, &mailbox, &account).await?)
            }
            "save_attachment" => {
                let (id, mailbox, account) = message_args(args)?;
                let attachment = args.text("attachment_name")?;
                let save_path = args.text("save_path")?;
                OperationResult::Text(
                    mail.save_attachment(&id, &mailbox, &account, &attachment, &save_path)
                        .await?,
                )
            }

            // VIP and rules
            "list_vip_senders" => OperationResult::List(
                mail.list_vip_senders()
                    .await?
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
            "list_rules" => OperationResult::records(mail.list_rules().await?),
            "enable_rule" => OperationResult::Text(
                mail.enable_rule(&args.text("name")?, args.boolean("enabled")?)
                    .await?,
            ),
            "get_rule_details" => {
                OperationResult::Object(mail.rule_details(&args.text("name")?).await?)
            }
            "create_rule" => {
                let conditions = args
                    .object_list("conditions")
                    .iter()
                    .map(RuleCondition::from_json)
                    .collect::<AppResult<Vec<_>>>()?;
                let actions = args
                    .opt_object("actions")
                    .map(|object| RuleActions::from_json(&object))
                    .unwrap_or_default();
                OperationResult::Text(
                    mail.create_rule(&args.text("name")?, &conditions, &actions)
                        .await?,
                )
            }
            "delete_rule" => OperationResult::Text(mail.delete_rule(&args.text("name")?).await?),

            // Sync
            "check_for_new_mail" => OperationResult::Text(
                mail.check_for_new_mail(args.opt_text("account_name").as_deref())
                    .await?,
            ),
            "synchronize_account" => OperationResult::Text(
                mail.synchronize_account(&args.text("account_name")?)
                    .await?,
            ),

            // Signatures, SMTP, special mailboxes
            "list_signatures" => OperationResult::records(mail.list_signatures().await?),
            "get_signature" => OperationResult::Object(mail.signature(&args.text("name")?).await?),
            "list_smtp_servers" => OperationResult::records(mail.list_smtp_servers().await?),
            "get_special_mailboxes" => OperationResult::Object(mail.special_mailboxes().await?),

            // Address helpers
            "extract_name_from_address" => {
                OperationResult::Text(mail.extract_name(&args.text("address")?).await?)
            }
            "extract_address" => {
                OperationResult::Text(mail.extract_address(&args.text("address")?).await?)
            }

            // Application
            "get_mail_app_info" => OperationResult::Object(mail.app_info().await?),
            "open_mailto" => OperationResult::Text(mail.open_mailto(&args.text("url")?).await?),
            "import_mailbox" => {
                OperationResult::Text(mail.import_mailbox(&args.text("path")?).await?)
            }

            other => return Err(AppError::invalid(format!("Unknown tool: {other}"))),
        };
        Ok(result)
    }
}

impl<R: ScriptRunner> ServerHandler for AppleMailServer<R> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "Apple Mail MCP server. Tools drive the running Mail application through AppleScript; message ids come from list_emails or search_emails.",
        )
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.tools())))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let arguments = request.arguments.unwrap_or_default();
            let envelope = self.dispatch(&request.name, &arguments).await;
            Ok(call_tool_result(envelope))
        }
    }
}

/// Convert a catalog entry into its MCP form
fn mcp_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool::new(
        descriptor.name,
        descriptor.description,
        Arc::new(descriptor.input_schema()),
    )
}

/// Map an envelope onto a single-text-item MCP result
pub fn call_tool_result(envelope: ResponseEnvelope) -> CallToolResult {
    let content = vec![Content::text(envelope.content)];
    if envelope.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

/// `id`, `mailbox` and `account_name`, shared by single-message tools
fn message_args(args: &ToolArgs) -> AppResult<(String, String, String)> {
    Ok((
        args.text("id")?,
        args.text("mailbox")?,
        args.text("account_name")?,
    ))
}

/// Build the response envelope and log the outcome
fn finalize_tool(tool: &str, started: Instant, result: AppResult<String>) -> ResponseEnvelope {
    match result {
        Ok(content) => {
            tracing::debug!(tool, duration_ms = duration_ms(started), "tool call succeeded");
            ResponseEnvelope::success(content)
        }
        Err(error) => {
            tracing::warn!(
                tool,
                duration_ms = duration_ms(started),
                error = %error,
                "tool call failed"
            );
            ResponseEnvelope::failure(&error)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{AppleMailServer, call_tool_result};
    use crate::applescript::ScriptValue;
    use crate::bridge::ScriptBridge;
    use crate::bridge::fake::RecordingRunner;
    use crate::catalog::CATALOG;
    use crate::config::ServerConfig;
    use crate::errors::AppError;
    use crate::mail::MailController;
    use crate::models::ResponseEnvelope;
    use rmcp::model::JsonObject;

    fn server() -> (AppleMailServer<RecordingRunner>, RecordingRunner) {
        let runner = RecordingRunner::default();
        let mail = MailController::new(ScriptBridge::new(runner.clone()), &ServerConfig::default());
        (AppleMailServer::new(mail), runner)
    }

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    #[test]
    fn tool_list_is_stable_and_complete() {
        let (server, _) = server();
        let first = serde_json::to_value(server.tools()).expect("serialize tools");
        let second = serde_json::to_value(server.tools()).expect("serialize tools");
        assert_eq!(first, second);
        assert_eq!(server.tools().len(), CATALOG.len());
        assert_eq!(first[0]["name"], "list_accounts");
    }

    #[tokio::test]
    async fn list_accounts_returns_name_records() {
        let (server, runner) = server();
        runner.reply_list(&["Work", "Home"]);

        let envelope = server.dispatch("list_accounts", &JsonObject::new()).await;
        assert!(!envelope.is_error);
        let parsed: Value = serde_json::from_str(&envelope.content).expect("content is JSON");
        assert_eq!(parsed, json!([{ "name": "Work" }, { "name": "Home" }]));
        assert_eq!(runner.scripts().len(), 1);
    }

    #[tokio::test]
    async fn mark_read_returns_confirmation_or_script_error() {
        let (server, runner) = server();
        let call = args(json!({
            "id": "42",
            "mailbox": "INBOX",
            "account_name": "Work",
            "read": true,
        }));

        runner.reply_text("Email marked as read");
        let envelope = server.dispatch("mark_read", &call).await;
        assert!(!envelope.is_error);
        assert_eq!(envelope.content, "Email marked as read");

        runner.reply(Err(AppError::script("object not found", 17)));
        let envelope = server.dispatch("mark_read", &call).await;
        assert!(envelope.is_error);
        assert_eq!(envelope.content, "Error: AppleScript error (17): object not found");
    }

    #[tokio::test]
    async fn missing_required_arguments_never_reach_mail() {
        let (server, runner) = server();
        let envelope = server
            .dispatch(
                "search_emails",
                &args(json!({ "query": "invoice", "account_name": "Work" })),
            )
            .await;
        assert!(envelope.is_error);
        assert_eq!(
            envelope.content,
            "Error: query, mailbox, and account_name are required"
        );
        assert!(runner.scripts().is_empty());
    }

    #[tokio::test]
    async fn numeric_json_id_is_not_a_string() {
        let (server, runner) = server();
        let envelope = server
            .dispatch(
                "mark_read",
                &args(json!({ "id": 42, "mailbox": "INBOX", "account_name": "Work", "read": "true" })),
            )
            .await;
        assert_eq!(
            envelope.content,
            "Error: id, mailbox, account_name, and read are required"
        );
        assert!(runner.scripts().is_empty());
    }

    #[tokio::test]
    async fn clearing_the_flag_color_reports_none() {
        let (server, runner) = server();
        runner.reply_text("Flag color set to none");
        let envelope = server
            .dispatch(
                "set_flag_color",
                &args(json!({
                    "id": "8",
                    "mailbox": "INBOX",
                    "account_name": "Work",
                    "color_index": -1,
                })),
            )
            .await;
        assert!(!envelope.is_error);
        assert!(envelope.content.contains("none"));
        let script = &runner.scripts()[0];
        assert!(script.contains("set flag index of message id 8"));
        assert!(script.contains("to -1\n"));
        assert!(script.contains("\"Flag color set to none\""));
    }

    #[tokio::test]
    async fn unknown_tools_are_reported() {
        let (server, runner) = server();
        let envelope = server.dispatch("send_fax", &JsonObject::new()).await;
        assert!(envelope.is_error);
        assert_eq!(envelope.content, "Error: Unknown tool: send_fax");
        assert!(runner.scripts().is_empty());
    }

    #[tokio::test]
    async fn unread_count_is_rendered_as_text() {
        let (server, runner) = server();
        runner.reply(Ok(ScriptValue::Atom("3".to_owned())));
        let envelope = server
            .dispatch("get_unread_count", &args(json!({ "account_name": "Work" })))
            .await;
        assert_eq!(envelope.content, "Unread count: 3");
    }

    #[tokio::test]
    async fn mistyped_optional_limit_falls_back_to_default() {
        let (server, runner) = server();
        let envelope = server
            .dispatch(
                "list_emails",
                &args(json!({ "mailbox": "INBOX", "account_name": "Work", "limit": "many" })),
            )
            .await;
        assert!(!envelope.is_error);
        assert_eq!(envelope.content, "[]");
        assert!(runner.scripts()[0].contains("if n > 50 then"));
    }

    #[tokio::test]
    async fn structured_results_are_key_sorted() {
        let (server, runner) = server();
        runner.reply_text("Hello");
        let envelope = server
            .dispatch("get_signature", &args(json!({ "name": "Work" })))
            .await;
        assert_eq!(
            envelope.content,
            "{\n  \"content\": \"Hello\",\n  \"name\": \"Work\"\n}"
        );
    }

    #[tokio::test]
    async fn create_rule_reads_conditions_and_actions() {
        let (server, runner) = server();
        let envelope = server
            .dispatch(
                "create_rule",
                &args(json!({
                    "name": "Newsletters",
                    "conditions": [{ "header": "subject", "qualifier": "begins_with", "expression": "[News]" }],
                    "actions": { "mark_read": "true" },
                })),
            )
            .await;
        assert!(!envelope.is_error, "{}", envelope.content);
        let script = &runner.scripts()[0];
        assert!(script.contains("rule type:subject header, qualifier:begins with value"));
        assert!(script.contains("set mark read to true"));
    }

    #[tokio::test]
    async fn every_catalog_tool_is_routed() {
        let (server, _) = server();
        for tool in CATALOG {
            let envelope = server.dispatch(tool.name, &JsonObject::new()).await;
            assert!(
                !envelope.content.contains("Unknown tool"),
                "{} is not routed",
                tool.name
            );
            if !tool.required_names().is_empty() {
                assert!(envelope.is_error, "{} accepted empty arguments", tool.name);
            }
        }
    }

    #[test]
    fn error_envelopes_map_to_error_results() {
        let result = call_tool_result(ResponseEnvelope::failure(&AppError::invalid(
            "url is required",
        )));
        assert_eq!(result.is_error, Some(true));
        let result = call_tool_result(ResponseEnvelope::success("ok".to_owned()));
        assert_eq!(result.is_error, Some(false));
    }
}

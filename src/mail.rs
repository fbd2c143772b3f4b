//! Mail operations expressed as AppleScript
//!
//! [`MailController`] owns one method per catalog operation. Each method
//! validates the values it embeds, renders a script from a template, runs it
//! through the shared [`ScriptBridge`] and shapes the raw result into strings,
//! records or numbers.
//!
//! Every user-supplied string is embedded through [`quoted`]. Values embedded
//! without quotes (message ids, limits, colour constants, rule qualifiers) are
//! checked against a numeric pattern or a closed set first.

use serde_json::{Map, Value, json};

use crate::applescript::{ScriptRunner, quoted};
use crate::bridge::{ScriptBridge, parse_bool, parse_int, rows_to_records, zip_columns};
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{RuleActions, RuleCondition};

/// Background colours Mail accepts, in catalog order
const BACKGROUND_COLORS: [&str; 8] = [
    "blue", "gray", "green", "none", "orange", "purple", "red", "yellow",
];

/// Flag colour names indexed by flag index
const FLAG_COLORS: [&str; 7] = ["red", "orange", "yellow", "green", "blue", "purple", "gray"];

/// Typed front end to the mail application
pub struct MailController<R> {
    bridge: ScriptBridge<R>,
    app_name: String,
    list_limit: i64,
    search_limit: i64,
}

impl<R> Clone for MailController<R> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            app_name: self.app_name.clone(),
            list_limit: self.list_limit,
            search_limit: self.search_limit,
        }
    }
}

impl<R: ScriptRunner> MailController<R> {
    pub fn new(bridge: ScriptBridge<R>, config: &ServerConfig) -> Self {
        Self {
            bridge,
            app_name: config.app_name.clone(),
            list_limit: i64::try_from(config.list_limit).unwrap_or(i64::MAX),
            search_limit: i64::try_from(config.search_limit).unwrap_or(i64::MAX),
        }
    }

    /// Wrap a script body in a `tell application` block
    fn tell(&self, body: &str) -> String {
        format!(
            "tell application {}\n{body}\nend tell",
            quoted(&self.app_name)
        )
    }

    // Accounts

    pub async fn list_accounts(&self) -> AppResult<Vec<Map<String, Value>>> {
        let names = self
            .bridge
            .run_list(self.tell("get name of every account"))
            .await?;
        Ok(named(names))
    }

    /// Two sequential executions: enabled flag, then addresses
    pub async fn account_info(&self, account: &str) -> AppResult<Map<String, Value>> {
        let account_ref = format!("account {}", quoted(account));
        let enabled = self
            .bridge
            .run_bool(self.tell(&format!("get enabled of {account_ref}")))
            .await?;
        let addresses = self
            .bridge
            .run_list(self.tell(&format!("get email addresses of {account_ref}")))
            .await?;

        let mut info = Map::new();
        info.insert("name".to_owned(), json!(account));
        info.insert("enabled".to_owned(), json!(enabled));
        info.insert("email_addresses".to_owned(), json!(addresses));
        Ok(info)
    }

    // Mailboxes

    pub async fn list_mailboxes(&self, account: Option<&str>) -> AppResult<Vec<Map<String, Value>>> {
        let body = match account {
            Some(account) => format!("get name of every mailbox of account {}", quoted(account)),
            None => "set allNames to {}\n\
                     repeat with acc in accounts\n\
                     set allNames to allNames & (name of every mailbox of acc)\n\
                     end repeat\n\
                     return allNames"
                .to_owned(),
        };
        let names = self.bridge.run_list(self.tell(&body)).await?;
        let mut mailboxes = named(names);
        if let Some(account) = account {
            for mailbox in &mut mailboxes {
                mailbox.insert("account".to_owned(), json!(account));
            }
        }
        Ok(mailboxes)
    }

    pub async fn create_mailbox(&self, name: &str, account: &str) -> AppResult<String> {
        let body = format!(
            "make new mailbox with properties {{name:{}}} at account {}\nreturn {}",
            quoted(name),
            quoted(account),
            quoted(&format!("Created mailbox: {name}"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    pub async fn delete_mailbox(&self, name: &str, account: &str) -> AppResult<String> {
        let body = format!(
            "delete {}\nreturn {}",
            mailbox_ref(name, account),
            quoted(&format!("Deleted mailbox: {name}"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    // Reading

    /// Three executions (id, subject, sender) zipped into records
    ///
    /// The count is clamped to the mailbox size inside each script so short
    /// mailboxes do not raise range errors.
    pub async fn list_emails(
        &self,
        mailbox: &str,
        account: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Map<String, Value>>> {
        let limit = resolve_limit(limit, self.list_limit)?;
        let mailbox = mailbox_ref(mailbox, account);
        let column = |field: &str| {
            self.tell(&format!(
                "set mbx to {mailbox}\n\
                 set n to count of messages of mbx\n\
                 if n > {limit} then set n to {limit}\n\
                 if n = 0 then return {{}}\n\
                 get {field} of messages 1 thru n of mbx"
            ))
        };

        // Cells keep `missing value` positions so the columns stay aligned.
        let ids = self.bridge.run_cells(column("id")).await?;
        let subjects = self.bridge.run_cells(column("subject")).await?;
        let senders = self.bridge.run_cells(column("sender")).await?;
        Ok(zip_columns(vec![
            ("id", ids),
            ("subject", subjects),
            ("sender", senders),
        ]))
    }

    /// Three sequential executions, failing on the first error
    pub async fn get_email(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
    ) -> AppResult<Map<String, Value>> {
        let message = message_ref(id, mailbox, account)?;
        let mut email = Map::new();
        email.insert("id".to_owned(), json!(id));
        for field in ["subject", "sender", "content"] {
            let value = self
                .bridge
                .run_text(self.tell(&format!("get {field} of {message}")))
                .await?;
            email.insert(field.to_owned(), Value::String(value));
        }
        Ok(email)
    }

    /// Messages whose subject or content contains `query`, one execution
    pub async fn search_emails(
        &self,
        query: &str,
        mailbox: &str,
        account: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Map<String, Value>>> {
        let limit = resolve_limit(limit, self.search_limit)?;
        let query = quoted(query);
        let body = format!(
            "set foundMsgs to (messages of {} whose subject contains {query} or content contains {query})\n\
             set msgRows to {{}}\n\
             repeat with msg in foundMsgs\n\
             if (count of msgRows) >= {limit} then exit repeat\n\
             set end of msgRows to {{id of msg as string, subject of msg, sender of msg}}\n\
             end repeat\n\
             return msgRows",
            mailbox_ref(mailbox, account)
        );
        let rows = self.bridge.run_rows(self.tell(&body)).await?;
        Ok(rows_to_records(&["id", "subject", "sender"], rows))
    }

    /// Unread count of one mailbox, one account, or everything
    ///
    /// A mailbox without an account counts every account.
    pub async fn unread_count(&self, mailbox: Option<&str>, account: Option<&str>) -> AppResult<i64> {
        let body = match (mailbox, account) {
            (Some(mailbox), Some(account)) => {
                format!("get unread count of {}", mailbox_ref(mailbox, account))
            }
            (None, Some(account)) => format!(
                "set total to 0\n\
                 repeat with mb in mailboxes of account {}\n\
                 set total to total + (unread count of mb)\n\
                 end repeat\n\
                 return total",
                quoted(account)
            ),
            _ => "set total to 0\n\
                  repeat with acc in accounts\n\
                  repeat with mb in mailboxes of acc\n\
                  set total to total + (unread count of mb)\n\
                  end repeat\n\
                  end repeat\n\
                  return total"
                .to_owned(),
        };
        let text = self.bridge.run_text(self.tell(&body)).await?;
        Ok(parse_int(&text, 0))
    }

    // Actions

    pub async fn mark_read(&self, id: &str, mailbox: &str, account: &str, read: bool) -> AppResult<String> {
        let state = if read { "read" } else { "unread" };
        self.set_property(
            id,
            mailbox,
            account,
            "read status",
            &read.to_string(),
            &format!("Email marked as {state}"),
        )
        .await
    }

    pub async fn flag_email(&self, id: &str, mailbox: &str, account: &str, flagged: bool) -> AppResult<String> {
        let state = if flagged { "flagged" } else { "unflagged" };
        self.set_property(
            id,
            mailbox,
            account,
            "flagged status",
            &flagged.to_string(),
            &format!("Email {state}"),
        )
        .await
    }

    pub async fn move_email(&self, id: &str, from: &str, to: &str, account: &str) -> AppResult<String> {
        self.transfer("move", id, from, to, account, "moved").await
    }

    pub async fn copy_email(&self, id: &str, from: &str, to: &str, account: &str) -> AppResult<String> {
        self.transfer("duplicate", id, from, to, account, "copied").await
    }

    async fn transfer(
        &self,
        verb: &str,
        id: &str,
        from: &str,
        to: &str,
        account: &str,
        done: &str,
    ) -> AppResult<String> {
        let body = format!(
            "set msg to {}\n{verb} msg to {}\nreturn {}",
            message_ref(id, from, account)?,
            mailbox_ref(to, account),
            quoted(&format!("Email {done} to {to}"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    pub async fn delete_email(&self, id: &str, mailbox: &str, account: &str) -> AppResult<String> {
        let body = format!(
            "delete {}\nreturn {}",
            message_ref(id, mailbox, account)?,
            quoted("Email deleted")
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    /// Indexes outside `-1..=6` clear the flag
    pub async fn set_flag_color(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        color_index: i64,
    ) -> AppResult<String> {
        let (index, label) = flag_color(color_index);
        self.set_property(
            id,
            mailbox,
            account,
            "flag index",
            &index.to_string(),
            &format!("Flag color set to {label}"),
        )
        .await
    }

    pub async fn set_background_color(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        color: &str,
    ) -> AppResult<String> {
        let color = BACKGROUND_COLORS
            .into_iter()
            .find(|known| known.eq_ignore_ascii_case(color.trim()))
            .ok_or_else(|| {
                AppError::invalid(format!(
                    "color must be one of: {}",
                    BACKGROUND_COLORS.join(", ")
                ))
            })?;
        self.set_property(
            id,
            mailbox,
            account,
            "background color",
            color,
            &format!("Background color set to {color}"),
        )
        .await
    }

    pub async fn mark_as_junk(&self, id: &str, mailbox: &str, account: &str, is_junk: bool) -> AppResult<String> {
        let state = if is_junk { "junk" } else { "not junk" };
        self.set_property(
            id,
            mailbox,
            account,
            "junk mail status",
            &is_junk.to_string(),
            &format!("Email marked as {state}"),
        )
        .await
    }

    /// Set one message property to a pre-validated AppleScript literal
    async fn set_property(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        property: &str,
        literal: &str,
        confirmation: &str,
    ) -> AppResult<String> {
        let body = format!(
            "set {property} of {} to {literal}\nreturn {}",
            message_ref(id, mailbox, account)?,
            quoted(confirmation)
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    // Compose

    pub async fn compose_email(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        cc: &[String],
        bcc: &[String],
    ) -> AppResult<String> {
        require_recipients(to)?;
        let mut recipients = recipient_lines("to", to);
        recipients.push_str(&recipient_lines("cc", cc));
        recipients.push_str(&recipient_lines("bcc", bcc));
        let script = new_message(subject, body, &recipients, "send", "Email sent successfully");
        self.bridge.run_text(self.tell(&script)).await
    }

    pub async fn create_draft(&self, to: &[String], subject: &str, body: &str) -> AppResult<String> {
        require_recipients(to)?;
        let script = new_message(
            subject,
            body,
            &recipient_lines("to", to),
            "save",
            "Draft created successfully",
        );
        self.bridge.run_text(self.tell(&script)).await
    }

    pub async fn reply_email(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        body: &str,
        reply_all: bool,
    ) -> AppResult<String> {
        let all = if reply_all { " and reply to all" } else { "" };
        let script = format!(
            "set originalMsg to {}\n\
             set replyMsg to reply originalMsg with opening window{all}\n\
             tell replyMsg\n\
             set content to {} & return & return & content\n\
             end tell\n\
             send replyMsg\n\
             return {}",
            message_ref(id, mailbox, account)?,
            quoted(body),
            quoted("Reply sent successfully")
        );
        self.bridge.run_text(self.tell(&script)).await
    }

    pub async fn forward_email(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        to: &[String],
        body: Option<&str>,
    ) -> AppResult<String> {
        require_recipients(to)?;
        let mut edits = recipient_lines("to", to);
        if let Some(body) = body {
            edits.push_str(&format!(
                "set content to {} & return & return & content\n",
                quoted(body)
            ));
        }
        let script = format!(
            "set originalMsg to {}\n\
             set fwdMsg to forward originalMsg with opening window\n\
             tell fwdMsg\n\
             {edits}end tell\n\
             send fwdMsg\n\
             return {}",
            message_ref(id, mailbox, account)?,
            quoted("Email forwarded successfully")
        );
        self.bridge.run_text(self.tell(&script)).await
    }

    /// Resend with the original sender preserved
    pub async fn redirect_email(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        to: &[String],
    ) -> AppResult<String> {
        require_recipients(to)?;
        let script = format!(
            "set originalMsg to {}\n\
             set redirectMsg to redirect originalMsg with opening window\n\
             tell redirectMsg\n\
             {}end tell\n\
             send redirectMsg\n\
             return {}",
            message_ref(id, mailbox, account)?,
            recipient_lines("to", to),
            quoted("Email redirected successfully")
        );
        self.bridge.run_text(self.tell(&script)).await
    }

    pub async fn list_drafts(&self, account: &str) -> AppResult<Vec<Map<String, Value>>> {
        let subjects = self
            .bridge
            .run_list(self.tell(&format!(
                "get subject of messages of {}",
                mailbox_ref("Drafts", account)
            )))
            .await?;
        Ok(zip_columns(vec![("subject", subjects)]))
    }

    // Message details

    pub async fn email_headers(&self, id: &str, mailbox: &str, account: &str) -> AppResult<String> {
        let message = message_ref(id, mailbox, account)?;
        self.bridge
            .run_text(self.tell(&format!("get all headers of {message}")))
            .await
    }

    pub async fn email_source(&self, id: &str, mailbox: &str, account: &str) -> AppResult<String> {
        let message = message_ref(id, mailbox, account)?;
        self.bridge
            .run_text(self.tell(&format!("get source of {message}")))
            .await
    }

    /// Status flags, size and dates of one message, read in one execution
    pub async fn email_metadata(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
    ) -> AppResult<Map<String, Value>> {
        let body = format!(
            "set msg to {}\n\
             return {{was forwarded of msg, was replied to of msg, was redirected of msg, \
             message size of msg, read status of msg, flagged status of msg, \
             junk mail status of msg, flag index of msg, \
             (date received of msg) as string, (date sent of msg) as string}}",
            message_ref(id, mailbox, account)?
        );
        let cells = self.bridge.run_cells(self.tell(&body)).await?;
        let cell = |index: usize| cells.get(index).map_or("", String::as_str);

        let mut metadata = Map::new();
        metadata.insert("was_forwarded".to_owned(), json!(parse_bool(cell(0))));
        metadata.insert("was_replied_to".to_owned(), json!(parse_bool(cell(1))));
        metadata.insert("was_redirected".to_owned(), json!(parse_bool(cell(2))));
        metadata.insert("size".to_owned(), json!(parse_int(cell(3), 0)));
        metadata.insert("read".to_owned(), json!(parse_bool(cell(4))));
        metadata.insert("flagged".to_owned(), json!(parse_bool(cell(5))));
        metadata.insert("junk".to_owned(), json!(parse_bool(cell(6))));
        metadata.insert("flag_index".to_owned(), json!(parse_int(cell(7), -1)));
        metadata.insert("date_received".to_owned(), json!(cell(8)));
        metadata.insert("date_sent".to_owned(), json!(cell(9)));
        Ok(metadata)
    }

    // Attachments

    pub async fn list_attachments(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
    ) -> AppResult<Vec<Map<String, Value>>> {
        let message = message_ref(id, mailbox, account)?;
        let names = self
            .bridge
            .run_list(self.tell(&format!("get name of every mail attachment of {message}")))
            .await?;
        Ok(named(names))
    }

    pub async fn save_attachment(
        &self,
        id: &str,
        mailbox: &str,
        account: &str,
        attachment_name: &str,
        save_path: &str,
    ) -> AppResult<String> {
        require_absolute(save_path, "save_path")?;
        let body = format!(
            "set msg to {}\n\
             repeat with att in mail attachments of msg\n\
             if name of att is {} then\n\
             save att in POSIX file {}\n\
             return {}\n\
             end if\n\
             end repeat\n\
             return {}",
            message_ref(id, mailbox, account)?,
            quoted(attachment_name),
            quoted(save_path),
            quoted(&format!("Attachment saved to {save_path}")),
            quoted("Attachment not found")
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    // VIP and rules

    pub async fn list_vip_senders(&self) -> AppResult<Vec<String>> {
        self.bridge
            .run_list(self.tell("get sender of messages of mailbox \"VIP\""))
            .await
    }

    pub async fn list_rules(&self) -> AppResult<Vec<Map<String, Value>>> {
        let names = self
            .bridge
            .run_list(self.tell("get name of every rule"))
            .await?;
        Ok(named(names))
    }

    pub async fn enable_rule(&self, name: &str, enabled: bool) -> AppResult<String> {
        let state = if enabled { "enabled" } else { "disabled" };
        let body = format!(
            "set enabled of rule {} to {enabled}\nreturn {}",
            quoted(name),
            quoted(&format!("Rule '{name}' {state}"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    /// Rule settings, then its conditions as rows
    pub async fn rule_details(&self, name: &str) -> AppResult<Map<String, Value>> {
        let rule = format!("rule {}", quoted(name));
        let settings = self
            .bridge
            .run_cells(self.tell(&format!(
                "set r to {rule}\n\
                 return {{name of r, enabled of r, all conditions must be met of r, \
                 delete message of r, mark read of r, mark flagged of r, should move message of r}}"
            )))
            .await?;
        let conditions = self
            .bridge
            .run_rows(self.tell(&format!(
                "set condRows to {{}}\n\
                 repeat with c in rule conditions of {rule}\n\
                 set end of condRows to {{rule type of c as string, header of c, qualifier of c as string, expression of c}}\n\
                 end repeat\n\
                 return condRows"
            )))
            .await?;

        let cell = |index: usize| settings.get(index).map_or("", String::as_str);
        let mut details = Map::new();
        let rule_name = match cell(0) {
            "" => name,
            reported => reported,
        };
        details.insert("name".to_owned(), json!(rule_name));
        details.insert("enabled".to_owned(), json!(parse_bool(cell(1))));
        details.insert(
            "all_conditions_must_be_met".to_owned(),
            json!(parse_bool(cell(2))),
        );
        details.insert("delete_message".to_owned(), json!(parse_bool(cell(3))));
        details.insert("mark_read".to_owned(), json!(parse_bool(cell(4))));
        details.insert("mark_flagged".to_owned(), json!(parse_bool(cell(5))));
        details.insert("should_move_message".to_owned(), json!(parse_bool(cell(6))));
        let conditions = rows_to_records(&["rule_type", "header", "qualifier", "expression"], conditions);
        details.insert(
            "conditions".to_owned(),
            Value::Array(conditions.into_iter().map(Value::Object).collect()),
        );
        Ok(details)
    }

    pub async fn create_rule(
        &self,
        name: &str,
        conditions: &[RuleCondition],
        actions: &RuleActions,
    ) -> AppResult<String> {
        let mut body = format!(
            "set newRule to make new rule at end of rules with properties {{name:{}, enabled:true}}\n\
             tell newRule\n",
            quoted(name)
        );
        for condition in conditions {
            body.push_str(&format!(
                "make new rule condition at end of rule conditions with properties {}\n",
                condition_properties(condition)?
            ));
        }
        if let Some(target) = &actions.move_message {
            let destination = match &actions.move_account {
                Some(account) => mailbox_ref(target, account),
                None => format!("mailbox {}", quoted(target)),
            };
            body.push_str(&format!(
                "set should move message to true\nset move message to {destination}\n"
            ));
        }
        for (enabled, property) in [
            (actions.mark_read, "mark read"),
            (actions.mark_flagged, "mark flagged"),
            (actions.delete_message, "delete message"),
        ] {
            if enabled {
                body.push_str(&format!("set {property} to true\n"));
            }
        }
        body.push_str(&format!(
            "end tell\nreturn {}",
            quoted(&format!("Rule '{name}' created"))
        ));
        self.bridge.run_text(self.tell(&body)).await
    }

    pub async fn delete_rule(&self, name: &str) -> AppResult<String> {
        let body = format!(
            "delete rule {}\nreturn {}",
            quoted(name),
            quoted(&format!("Rule '{name}' deleted"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    // Sync

    pub async fn check_for_new_mail(&self, account: Option<&str>) -> AppResult<String> {
        let body = match account {
            Some(account) => format!(
                "check for new mail for account {}\nreturn {}",
                quoted(account),
                quoted(&format!("Checking for new mail in {account}"))
            ),
            None => format!("check for new mail\nreturn {}", quoted("Checking for new mail")),
        };
        self.bridge.run_text(self.tell(&body)).await
    }

    pub async fn synchronize_account(&self, account: &str) -> AppResult<String> {
        let body = format!(
            "synchronize with account {}\nreturn {}",
            quoted(account),
            quoted(&format!("Synchronized account {account}"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }

    // Signatures, SMTP, special mailboxes

    pub async fn list_signatures(&self) -> AppResult<Vec<Map<String, Value>>> {
        let names = self
            .bridge
            .run_list(self.tell("get name of every signature"))
            .await?;
        Ok(named(names))
    }

    pub async fn signature(&self, name: &str) -> AppResult<Map<String, Value>> {
        let content = self
            .bridge
            .run_text(self.tell(&format!("get content of signature {}", quoted(name))))
            .await?;
        let mut signature = Map::new();
        signature.insert("name".to_owned(), json!(name));
        signature.insert("content".to_owned(), json!(content));
        Ok(signature)
    }

    pub async fn list_smtp_servers(&self) -> AppResult<Vec<Map<String, Value>>> {
        let rows = self
            .bridge
            .run_rows(self.tell(
                "set smtpRows to {}\n\
                 repeat with s in smtp servers\n\
                 set end of smtpRows to {name of s, server name of s, port of s, uses ssl of s, enabled of s, user name of s}\n\
                 end repeat\n\
                 return smtpRows",
            ))
            .await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.len() >= 6)
            .map(|row| {
                let mut server = Map::new();
                server.insert("name".to_owned(), json!(row[0]));
                server.insert("server_name".to_owned(), json!(row[1]));
                server.insert("port".to_owned(), json!(parse_int(&row[2], 0)));
                server.insert("uses_ssl".to_owned(), json!(parse_bool(&row[3])));
                server.insert("enabled".to_owned(), json!(parse_bool(&row[4])));
                server.insert("user_name".to_owned(), json!(row[5]));
                server
            })
            .collect())
    }

    pub async fn special_mailboxes(&self) -> AppResult<Map<String, Value>> {
        const FIELDS: [&str; 6] = ["inbox", "drafts", "sent", "trash", "junk", "outbox"];
        let cells = self
            .bridge
            .run_cells(self.tell(
                "return {name of inbox, name of drafts mailbox, name of sent mailbox, \
                 name of trash mailbox, name of junk mailbox, name of outbox}",
            ))
            .await?;
        let mut mailboxes = Map::new();
        for (index, field) in FIELDS.into_iter().enumerate() {
            let name = cells.get(index).cloned().unwrap_or_default();
            mailboxes.insert(field.to_owned(), Value::String(name));
        }
        Ok(mailboxes)
    }

    // Address helpers

    pub async fn extract_name(&self, address: &str) -> AppResult<String> {
        self.bridge
            .run_text(self.tell(&format!("extract name from {}", quoted(address))))
            .await
    }

    pub async fn extract_address(&self, address: &str) -> AppResult<String> {
        self.bridge
            .run_text(self.tell(&format!("extract address from {}", quoted(address))))
            .await
    }

    // Application

    pub async fn app_info(&self) -> AppResult<Map<String, Value>> {
        let cells = self
            .bridge
            .run_cells(self.tell(
                "return {version, application version, fetch interval, \
                 background activity count, fetches automatically}",
            ))
            .await?;
        let cell = |index: usize| cells.get(index).map_or("", String::as_str);

        let mut info = Map::new();
        info.insert("version".to_owned(), json!(cell(0)));
        info.insert("application_version".to_owned(), json!(cell(1)));
        info.insert("fetch_interval".to_owned(), json!(parse_int(cell(2), -1)));
        info.insert(
            "background_activity_count".to_owned(),
            json!(parse_int(cell(3), 0)),
        );
        info.insert("fetches_automatically".to_owned(), json!(parse_bool(cell(4))));
        Ok(info)
    }

    pub async fn open_mailto(&self, url: &str) -> AppResult<String> {
        if !url.starts_with("mailto:") {
            return Err(AppError::invalid("url must start with mailto:"));
        }
        let body = format!("mailto {}\nreturn {}", quoted(url), quoted("Opened mailto URL"));
        self.bridge.run_text(self.tell(&body)).await
    }

    pub async fn import_mailbox(&self, path: &str) -> AppResult<String> {
        require_absolute(path, "path")?;
        let body = format!(
            "import Mail mailbox at (POSIX file {})\nreturn {}",
            quoted(path),
            quoted(&format!("Imported mailbox from {path}"))
        );
        self.bridge.run_text(self.tell(&body)).await
    }
}

/// One `{"name": ...}` record per name
fn named(names: Vec<String>) -> Vec<Map<String, Value>> {
    zip_columns(vec![("name", names)])
}

fn mailbox_ref(mailbox: &str, account: &str) -> String {
    format!("mailbox {} of account {}", quoted(mailbox), quoted(account))
}

/// Message specifier; the id is embedded unquoted so it must be numeric
fn message_ref(id: &str, mailbox: &str, account: &str) -> AppResult<String> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::invalid("id must be a numeric message id"));
    }
    Ok(format!("message id {id} of {}", mailbox_ref(mailbox, account)))
}

fn resolve_limit(limit: Option<i64>, default: i64) -> AppResult<i64> {
    match limit.unwrap_or(default) {
        n if n > 0 => Ok(n),
        _ => Err(AppError::invalid("limit must be a positive integer")),
    }
}

fn require_recipients(to: &[String]) -> AppResult<()> {
    if to.iter().all(|address| address.trim().is_empty()) {
        return Err(AppError::invalid("to must contain at least one recipient"));
    }
    Ok(())
}

fn require_absolute(path: &str, field: &str) -> AppResult<()> {
    if !path.starts_with('/') {
        return Err(AppError::invalid(format!("{field} must be an absolute path")));
    }
    Ok(())
}

/// `make new <kind> recipient` lines, one per non-blank address
fn recipient_lines(kind: &str, addresses: &[String]) -> String {
    addresses
        .iter()
        .filter(|address| !address.trim().is_empty())
        .map(|address| {
            format!(
                "make new {kind} recipient at end of {kind} recipients with properties {{address:{}}}\n",
                quoted(address)
            )
        })
        .collect()
}

/// Script creating an outgoing message, then sending or saving it
fn new_message(subject: &str, body: &str, recipients: &str, finish: &str, confirmation: &str) -> String {
    format!(
        "set newMessage to make new outgoing message with properties {{subject:{}, content:{}, visible:true}}\n\
         tell newMessage\n\
         {recipients}end tell\n\
         {finish} newMessage\n\
         return {}",
        quoted(subject),
        quoted(body),
        quoted(confirmation)
    )
}

/// Normalized flag index and its colour label
fn flag_color(color_index: i64) -> (i64, &'static str) {
    usize::try_from(color_index)
        .ok()
        .and_then(|index| FLAG_COLORS.get(index).map(|label| (color_index, *label)))
        .unwrap_or((-1, "none"))
}

/// Property record for one `rule condition`
fn condition_properties(condition: &RuleCondition) -> AppResult<String> {
    let qualifier = rule_qualifier(&condition.qualifier)?;
    let expression = quoted(&condition.expression);
    let header = condition.header.trim();
    let rule_type = match header.to_ascii_lowercase().as_str() {
        "from" => Some("from header"),
        "to" => Some("to header"),
        "cc" => Some("cc header"),
        "subject" => Some("subject header"),
        "content" | "body" | "message content" => Some("message content"),
        "any recipient" | "any_recipient" => Some("any recipient"),
        _ => None,
    };
    Ok(match rule_type {
        Some(rule_type) => {
            format!("{{rule type:{rule_type}, qualifier:{qualifier}, expression:{expression}}}")
        }
        None => format!(
            "{{rule type:header key, header:{}, qualifier:{qualifier}, expression:{expression}}}",
            quoted(header)
        ),
    })
}

fn rule_qualifier(qualifier: &str) -> AppResult<&'static str> {
    match qualifier.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
        "contains" => Ok("does contain value"),
        "does_not_contain" => Ok("does not contain value"),
        "begins_with" => Ok("begins with value"),
        "ends_with" => Ok("ends with value"),
        "equals" | "equal_to" | "is_equal_to" => Ok("equal to value"),
        _ => Err(AppError::invalid(format!(
            "unsupported rule qualifier: {qualifier}"
        ))),
    }
}

//! Static tool catalog
//!
//! Every tool the server exposes is declared here, once, with its parameter
//! schema. The dispatcher validates arguments against these declarations and
//! `tools/list` is built from them.

use crate::models::ParamType::{Boolean, Integer, Object, ObjectArray, String as Text, StringArray};
use crate::models::{ParamSpec, ToolDescriptor};

const ID: ParamSpec = ParamSpec::required("id", Text, "The email ID");
const MAILBOX: ParamSpec = ParamSpec::required("mailbox", Text, "Mailbox name");
const ACCOUNT: ParamSpec = ParamSpec::required("account_name", Text, "The mail account");
const FROM_MAILBOX: ParamSpec = ParamSpec::required("from_mailbox", Text, "Source mailbox");
const TO_MAILBOX: ParamSpec = ParamSpec::required("to_mailbox", Text, "Destination mailbox");
const RULE_NAME: ParamSpec = ParamSpec::required("name", Text, "Name of the rule");
const ADDRESS: ParamSpec = ParamSpec::required("address", Text, "Full email address");
const SUBJECT: ParamSpec = ParamSpec::required("subject", Text, "Email subject");
const BODY: ParamSpec = ParamSpec::required("body", Text, "Email body content");
const RECIPIENTS: ParamSpec =
    ParamSpec::required("to", StringArray, "Recipient email addresses");

/// Parameters shared by every tool addressing a single message
const MESSAGE: [ParamSpec; 3] = [ID, MAILBOX, ACCOUNT];

/// All tools, in the order they are advertised
pub static CATALOG: &[ToolDescriptor] = &[
    // Accounts
    ToolDescriptor {
        name: "list_accounts",
        description: "List all mail accounts configured in Apple Mail",
        params: &[],
    },
    ToolDescriptor {
        name: "get_account_info",
        description: "Get detailed information about a specific mail account",
        params: &[ParamSpec::required(
            "account_name",
            Text,
            "The name of the mail account",
        )],
    },
    // Mailboxes
    ToolDescriptor {
        name: "list_mailboxes",
        description: "List all mailboxes (folders) for an account",
        params: &[ParamSpec::optional(
            "account_name",
            Text,
            "The name of the mail account (optional, lists all if omitted)",
        )],
    },
    ToolDescriptor {
        name: "create_mailbox",
        description: "Create a new mailbox (folder) in an account",
        params: &[
            ParamSpec::required("name", Text, "Name of the new mailbox"),
            ParamSpec::required("account_name", Text, "The account to create the mailbox in"),
        ],
    },
    ToolDescriptor {
        name: "delete_mailbox",
        description: "Delete a mailbox (folder) from an account",
        params: &[
            ParamSpec::required("name", Text, "Name of the mailbox to delete"),
            ParamSpec::required("account_name", Text, "The account containing the mailbox"),
        ],
    },
    // Reading
    ToolDescriptor {
        name: "list_emails",
        description: "List emails in a mailbox",
        params: &[
            ParamSpec::required("mailbox", Text, "Mailbox name (e.g., 'INBOX')"),
            ACCOUNT,
            ParamSpec::optional(
                "limit",
                Integer,
                "Maximum number of emails to return (default: 50)",
            ),
        ],
    },
    ToolDescriptor {
        name: "get_email",
        description: "Get full content of a specific email",
        params: &MESSAGE,
    },
    ToolDescriptor {
        name: "search_emails",
        description: "Search emails by subject or content",
        params: &[
            ParamSpec::required("query", Text, "Search query"),
            ParamSpec::required("mailbox", Text, "Mailbox to search in"),
            ACCOUNT,
            ParamSpec::optional("limit", Integer, "Maximum results (default: 20)"),
        ],
    },
    ToolDescriptor {
        name: "get_unread_count",
        description: "Get the number of unread emails",
        params: &[
            ParamSpec::optional("mailbox", Text, "Mailbox name (optional)"),
            ParamSpec::optional("account_name", Text, "Account name (optional)"),
        ],
    },
    // Actions
    ToolDescriptor {
        name: "mark_read",
        description: "Mark an email as read or unread",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("read", Boolean, "true=read, false=unread"),
        ],
    },
    ToolDescriptor {
        name: "flag_email",
        description: "Flag or unflag an email",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("flagged", Boolean, "true=flag, false=unflag"),
        ],
    },
    ToolDescriptor {
        name: "move_email",
        description: "Move an email to another mailbox",
        params: &[ID, FROM_MAILBOX, TO_MAILBOX, ACCOUNT],
    },
    ToolDescriptor {
        name: "delete_email",
        description: "Delete an email (move to trash)",
        params: &MESSAGE,
    },
    // Compose
    ToolDescriptor {
        name: "compose_email",
        description: "Compose and send a new email",
        params: &[
            RECIPIENTS,
            SUBJECT,
            BODY,
            ParamSpec::optional("cc", StringArray, "CC recipients (optional)"),
            ParamSpec::optional("bcc", StringArray, "BCC recipients (optional)"),
        ],
    },
    ToolDescriptor {
        name: "reply_email",
        description: "Reply to an email",
        params: &[
            ParamSpec::required("id", Text, "The email ID to reply to"),
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("body", Text, "Reply content"),
            ParamSpec::optional(
                "reply_all",
                Boolean,
                "Reply to all recipients (default: false)",
            ),
        ],
    },
    ToolDescriptor {
        name: "forward_email",
        description: "Forward an email",
        params: &[
            ParamSpec::required("id", Text, "The email ID to forward"),
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("to", StringArray, "Recipients to forward to"),
            ParamSpec::optional("body", Text, "Optional message to add"),
        ],
    },
    ToolDescriptor {
        name: "list_drafts",
        description: "List all draft emails",
        params: &[ACCOUNT],
    },
    ToolDescriptor {
        name: "create_draft",
        description: "Create a new draft email",
        params: &[RECIPIENTS, SUBJECT, BODY],
    },
    // Attachments
    ToolDescriptor {
        name: "list_attachments",
        description: "List attachments of an email",
        params: &MESSAGE,
    },
    ToolDescriptor {
        name: "save_attachment",
        description: "Save an email attachment to disk",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("attachment_name", Text, "Name of the attachment to save"),
            ParamSpec::required("save_path", Text, "Full path where to save the file"),
        ],
    },
    // VIP and rules
    ToolDescriptor {
        name: "list_vip_senders",
        description: "List VIP senders",
        params: &[],
    },
    ToolDescriptor {
        name: "list_rules",
        description: "List all mail rules",
        params: &[],
    },
    ToolDescriptor {
        name: "enable_rule",
        description: "Enable or disable a mail rule",
        params: &[
            RULE_NAME,
            ParamSpec::required("enabled", Boolean, "true=enable, false=disable"),
        ],
    },
    ToolDescriptor {
        name: "get_rule_details",
        description: "Get detailed information about a mail rule",
        params: &[RULE_NAME],
    },
    ToolDescriptor {
        name: "create_rule",
        description: "Create a new mail rule",
        params: &[
            RULE_NAME,
            ParamSpec::optional(
                "conditions",
                ObjectArray,
                "Array of conditions with header, qualifier, expression",
            ),
            ParamSpec::optional(
                "actions",
                Object,
                "Actions: move_message, move_account, mark_read, mark_flagged, delete_message",
            ),
        ],
    },
    ToolDescriptor {
        name: "delete_rule",
        description: "Delete a mail rule",
        params: &[ParamSpec::required("name", Text, "Name of the rule to delete")],
    },
    // Sync
    ToolDescriptor {
        name: "check_for_new_mail",
        description: "Trigger a check for new email",
        params: &[ParamSpec::optional(
            "account_name",
            Text,
            "Account to check (optional, checks all if omitted)",
        )],
    },
    ToolDescriptor {
        name: "synchronize_account",
        description: "Synchronize an IMAP account with the server",
        params: &[ParamSpec::required("account_name", Text, "Account to synchronize")],
    },
    // Advanced actions
    ToolDescriptor {
        name: "copy_email",
        description: "Copy an email to another mailbox",
        params: &[ID, FROM_MAILBOX, TO_MAILBOX, ACCOUNT],
    },
    ToolDescriptor {
        name: "set_flag_color",
        description: "Set the flag color of an email (0=red, 1=orange, 2=yellow, 3=green, 4=blue, 5=purple, 6=gray, -1=clear)",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("color_index", Integer, "Flag color index (0-6, or -1 to clear)"),
        ],
    },
    ToolDescriptor {
        name: "set_background_color",
        description: "Set the background color of an email (blue, gray, green, none, orange, purple, red, yellow)",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required(
                "color",
                Text,
                "Background color: blue, gray, green, none, orange, purple, red, yellow",
            ),
        ],
    },
    ToolDescriptor {
        name: "mark_as_junk",
        description: "Mark an email as junk or not junk",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("is_junk", Boolean, "true=junk, false=not junk"),
        ],
    },
    // Message details
    ToolDescriptor {
        name: "get_email_headers",
        description: "Get all headers of an email",
        params: &MESSAGE,
    },
    ToolDescriptor {
        name: "get_email_source",
        description: "Get the raw source of an email",
        params: &MESSAGE,
    },
    ToolDescriptor {
        name: "redirect_email",
        description: "Redirect an email (keeps original sender, different from forward)",
        params: &[
            ID,
            MAILBOX,
            ACCOUNT,
            ParamSpec::required("to", StringArray, "Recipients to redirect to"),
        ],
    },
    ToolDescriptor {
        name: "get_email_metadata",
        description: "Get email metadata (was forwarded, replied, redirected, size)",
        params: &MESSAGE,
    },
    // Signatures, SMTP, special mailboxes
    ToolDescriptor {
        name: "list_signatures",
        description: "List all email signatures",
        params: &[],
    },
    ToolDescriptor {
        name: "get_signature",
        description: "Get the content of a signature",
        params: &[ParamSpec::required("name", Text, "Name of the signature")],
    },
    ToolDescriptor {
        name: "list_smtp_servers",
        description: "List all SMTP servers",
        params: &[],
    },
    ToolDescriptor {
        name: "get_special_mailboxes",
        description: "Get special mailbox names (inbox, drafts, sent, trash, junk, outbox)",
        params: &[],
    },
    // Address helpers
    ToolDescriptor {
        name: "extract_name_from_address",
        description: "Extract the name from a full email address (e.g., 'John Doe <john@example.com>' -> 'John Doe')",
        params: &[ADDRESS],
    },
    ToolDescriptor {
        name: "extract_address",
        description: "Extract the email address from a full address string (e.g., 'John Doe <john@example.com>' -> 'john@example.com')",
        params: &[ADDRESS],
    },
    // Application
    ToolDescriptor {
        name: "get_mail_app_info",
        description: "Get Mail application information (version, fetch interval, background activity)",
        params: &[],
    },
    ToolDescriptor {
        name: "open_mailto",
        description: "Open a mailto URL to compose an email",
        params: &[ParamSpec::required(
            "url",
            Text,
            "mailto URL (e.g., 'mailto:test@example.com?subject=Hello')",
        )],
    },
    ToolDescriptor {
        name: "import_mailbox",
        description: "Import a mailbox from a file",
        params: &[ParamSpec::required(
            "path",
            Text,
            "Absolute path to the mailbox file to import",
        )],
    },
];

/// Look up a tool by name
pub fn find(name: &str) -> Option<&'static ToolDescriptor> {
    CATALOG.iter().find(|tool| tool.name == name)
}

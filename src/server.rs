//! MCP server implementation with tool handlers
//!
//! Implements the `ServerHandler` trait and registers 4 MCP tools. Handles
//! input validation, pipeline orchestration, and response formatting.

use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ErrorData, ServerCapabilities, ServerInfo};
use rmcp::{Json, ServerHandler, tool, tool_handler, tool_router};

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::imap;
use crate::models::{
    AccountInfo, AccountOnlyInput, ConsolidateData, ConsolidateInput, MailboxInfo, Meta,
    RenderContextData, RenderContextInput, ToolEnvelope,
};
use crate::pipeline::{self, PipelineOptions};
use crate::query::FilterCriteria;
use crate::render::{SelectionSet, render_context_html, render_reference_list};
use crate::store::ImapStore;

/// Maximum mailboxes returned by `mail_list_mailboxes`
const MAX_MAILBOXES: usize = 200;

/// Mail context MCP server
///
/// Holds shared configuration. Implements MCP tool handlers via `#[tool]`
/// attribute macro and `ServerHandler` trait.
#[derive(Clone)]
pub struct MailContextServer {
    /// Server config (accounts, timeouts, pipeline settings)
    config: Arc<ServerConfig>,
    /// Tool router for dispatching MCP tool calls
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MailContextServer {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            tool_router: Self::tool_router(),
        }
    }

    /// Tool: List configured IMAP accounts
    ///
    /// Returns account metadata (host, port, secure) without exposing
    /// credentials.
    #[tool(
        name = "mail_list_accounts",
        description = "List configured IMAP accounts"
    )]
    async fn list_accounts(&self) -> Result<Json<ToolEnvelope<Vec<AccountInfo>>>, ErrorData> {
        let started = Instant::now();
        let data = self
            .config
            .accounts
            .values()
            .map(|a| AccountInfo {
                account_id: a.account_id.clone(),
                host: a.host.clone(),
                port: a.port,
                secure: a.secure,
            })
            .collect::<Vec<_>>();
        finalize_tool(
            started,
            Ok((format!("{} account(s) configured", data.len()), data)),
        )
    }

    /// Tool: List mailboxes for an account
    #[tool(
        name = "mail_list_mailboxes",
        description = "List mailboxes for an account"
    )]
    async fn list_mailboxes(
        &self,
        Parameters(input): Parameters<AccountOnlyInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.list_mailboxes_impl(input).await.map(|data| {
                (
                    format!(
                        "{} mailbox(es)",
                        data["mailboxes"].as_array().map_or(0, Vec::len)
                    ),
                    data,
                )
            }),
        )
    }

    /// Tool: Query a mailbox and consolidate the newest matches
    ///
    /// Returns at most 20 bounded records, newest first for `date`, and
    /// descending by key for `subject` and `from`.
    #[tool(
        name = "mail_consolidate",
        description = "Search a mailbox and consolidate up to 20 matching messages into bounded text records (subject, from, date, body preview, full body with attachments)"
    )]
    async fn consolidate(
        &self,
        Parameters(input): Parameters<ConsolidateInput>,
    ) -> Result<Json<ToolEnvelope<ConsolidateData>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.consolidate_impl(input).await.map(|data| {
                (
                    format!(
                        "{} of {} matching message(s) consolidated",
                        data.records.len(),
                        data.total_matched
                    ),
                    data,
                )
            }),
        )
    }

    /// Tool: Render selected records as reference HTML and model context
    #[tool(
        name = "mail_render_context",
        description = "Render previously consolidated records as an HTML reference list and an escaped numbered context block"
    )]
    async fn render_context(
        &self,
        Parameters(input): Parameters<RenderContextInput>,
    ) -> Result<Json<ToolEnvelope<RenderContextData>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            render_context_impl(&input).map(|data| {
                let mut summary = format!("{} email(s) rendered", data.selected);
                if data.skipped > 0 {
                    summary.push_str(&format!(", {} entr(ies) skipped", data.skipped));
                }
                (summary, data)
            }),
        )
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for MailContextServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "Read-only mail context server. Call mail_consolidate to gather recent messages, then pass the chosen records to mail_render_context.",
        )
    }
}

/// Tool implementation methods
///
/// Private methods handle the actual business logic for each tool, separated
/// from the public `#[tool]` methods that handle response formatting.
impl MailContextServer {
    async fn list_mailboxes_impl(&self, input: AccountOnlyInput) -> AppResult<serde_json::Value> {
        validate_account_id(&input.account_id)?;
        let account = self.config.get_account(&input.account_id)?;
        let mut session = imap::connect_authenticated(&self.config, account).await?;

        let items = imap::list_all_mailboxes(&self.config, &mut session).await?;

        let mailboxes = items
            .into_iter()
            .take(MAX_MAILBOXES)
            .map(|item| MailboxInfo {
                name: utf7_imap::decode_utf7_imap(item.name().to_owned()),
                delimiter: item.delimiter().map(|d| d.to_string()),
            })
            .collect::<Vec<_>>();

        Ok(serde_json::json!({
            "account_id": account.account_id,
            "mailboxes": mailboxes,
        }))
    }

    async fn consolidate_impl(&self, input: ConsolidateInput) -> AppResult<ConsolidateData> {
        validate_account_id(&input.account_id)?;
        let mailbox = input
            .mailbox
            .unwrap_or_else(|| self.config.default_mailbox.clone());
        validate_mailbox(&mailbox)?;
        let account = self.config.get_account(&input.account_id)?;

        let criteria = FilterCriteria::from_request(
            input.sort_by.as_deref(),
            input.filter_subject.as_deref(),
            input.filter_from.as_deref(),
        );
        let options = PipelineOptions {
            max_results: self.config.max_results,
            date_format: self.config.date_format.clone(),
        };

        let mut store = ImapStore::connect(&self.config, account).await?;
        let outcome = pipeline::consolidate(&mut store, &mailbox, &criteria, &options).await?;

        Ok(ConsolidateData {
            account_id: account.account_id.clone(),
            mailbox,
            sort_by: criteria.sort_by.as_str().to_owned(),
            total_matched: outcome.total_matched,
            records: outcome.records,
        })
    }
}

fn render_context_impl(input: &RenderContextInput) -> AppResult<RenderContextData> {
    let selection = SelectionSet::decode(&input.selected_emails)?;
    tracing::debug!(
        selected = selection.emails.len(),
        skipped = selection.skipped,
        "rendering context"
    );
    Ok(RenderContextData {
        selected: selection.emails.len(),
        skipped: selection.skipped,
        reference_html: render_reference_list(&selection.emails),
        context_html: render_context_html(&selection.emails),
    })
}

/// Calculate elapsed milliseconds
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

/// Build a standardized MCP tool response envelope from business logic output
fn finalize_tool<T>(
    started: Instant,
    result: AppResult<(String, T)>,
) -> Result<Json<ToolEnvelope<T>>, ErrorData>
where
    T: schemars::JsonSchema,
{
    match result {
        Ok((summary, data)) => Ok(Json(ToolEnvelope {
            summary,
            data,
            meta: Meta::now(duration_ms(started)),
        })),
        Err(e) => {
            tracing::debug!(error = %e, "tool failed");
            Err(e.to_error_data())
        }
    }
}

/// Validate account_id format
fn validate_account_id(account_id: &str) -> AppResult<()> {
    if account_id.is_empty() || account_id.len() > 64 {
        return Err(AppError::InvalidInput(
            "account_id must be 1..64 characters".to_owned(),
        ));
    }
    if !account_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(AppError::InvalidInput(
            "account_id must match [A-Za-z0-9_-]+".to_owned(),
        ));
    }
    Ok(())
}

/// Validate mailbox name format
fn validate_mailbox(mailbox: &str) -> AppResult<()> {
    if mailbox.is_empty() || mailbox.chars().count() > 256 {
        return Err(AppError::InvalidInput(
            "mailbox must be 1..256 characters".to_owned(),
        ));
    }
    validate_no_controls(mailbox, "mailbox")?;
    Ok(())
}

/// Reject control characters in user-provided values
fn validate_no_controls(value: &str, field: &str) -> AppResult<()> {
    if value.chars().any(char::is_control) {
        return Err(AppError::InvalidInput(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}

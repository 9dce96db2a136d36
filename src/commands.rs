//! Slash-command parsing and routing.
//!
//! Slash commands hit the remote APIs directly; anything else is handed
//! to the agent runtime. Either way the reply comes back as constrained
//! HTML and flows through the converter, chunker and delivery helper.

use crate::agent::AgentRuntime;
use crate::error::{Error, Result};
use crate::forge::Forge;
use crate::progress::{Progress, StepStatus};
use crate::runner::TaskRunner;
use crate::tracker::IssueTracker;
use std::sync::Arc;

/// A recognized slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Issues,
    Issue { key: String },
    Create { title: String },
    Comment { key: String, text: String },
    Prs,
    Tasks,
    Run { job: String },
}

/// What an inbound text turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Started with `/` but was not usable; holds the usage notice.
    Invalid(String),
    /// Free text for the agent.
    Chat(String),
}

const HELP: &str = "<h3>Commands</h3>\
<ul>\
<li><code>/issues</code> — your open issues</li>\
<li><code>/issue KEY</code> — one issue in full</li>\
<li><code>/create TITLE</code> — open a new issue</li>\
<li><code>/comment KEY TEXT</code> — comment on an issue</li>\
<li><code>/prs</code> — open pull requests</li>\
<li><code>/tasks</code> — recent background jobs</li>\
<li><code>/run JOB</code> — dispatch a background job</li>\
</ul>\
<p>Anything else is treated as a request for the assistant.</p>";

/// Classify one inbound text.
pub fn parse(text: &str) -> Parsed {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return Parsed::Chat(text.to_string());
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    // Telegram clients may append the bot's username to the command.
    let name = name.split('@').next().unwrap_or(name);

    match name {
        "start" => Parsed::Command(Command::Start),
        "help" => Parsed::Command(Command::Help),
        "issues" => Parsed::Command(Command::Issues),
        "prs" => Parsed::Command(Command::Prs),
        "tasks" => Parsed::Command(Command::Tasks),
        "issue" => require_arg(args, "Usage: <code>/issue KEY</code>", |key| Command::Issue {
            key: key.to_string(),
        }),
        "create" => require_arg(args, "Usage: <code>/create TITLE</code>", |title| {
            Command::Create {
                title: title.to_string(),
            }
        }),
        "run" => require_arg(args, "Usage: <code>/run JOB</code>", |job| Command::Run {
            job: job.to_string(),
        }),
        "comment" => match args.split_once(char::is_whitespace) {
            Some((key, text)) if !text.trim().is_empty() => Parsed::Command(Command::Comment {
                key: key.to_string(),
                text: text.trim().to_string(),
            }),
            _ => Parsed::Invalid("Usage: <code>/comment KEY TEXT</code>".into()),
        },
        other => Parsed::Invalid(format!(
            "Unknown command <code>/{other}</code>. Try <code>/help</code>."
        )),
    }
}

fn require_arg(args: &str, usage: &str, build: impl FnOnce(&str) -> Command) -> Parsed {
    if args.is_empty() {
        Parsed::Invalid(usage.to_string())
    } else {
        Parsed::Command(build(args))
    }
}

/// The remote services one inbound message may touch.
pub struct Services {
    pub tracker: IssueTracker,
    pub forge: Option<Forge>,
    pub runner: Option<TaskRunner>,
    pub agent: Arc<dyn AgentRuntime>,
}

impl Services {
    /// Produce the constrained-HTML reply for one inbound text.
    pub async fn respond(
        &self,
        text: &str,
        session: &str,
        progress: &mut Progress,
    ) -> Result<String> {
        match parse(text) {
            Parsed::Invalid(notice) => Ok(format!("<p>{notice}</p>")),
            Parsed::Command(command) => self.run_command(command, progress).await,
            Parsed::Chat(text) => {
                progress
                    .update("thinking", StepStatus::InProgress, None)
                    .await;
                let reply = self.agent.generate(&text, session).await?;
                progress.update("thinking", StepStatus::Completed, None).await;
                Ok(reply.text)
            }
        }
    }

    async fn run_command(&self, command: Command, progress: &mut Progress) -> Result<String> {
        match command {
            Command::Start => Ok(
                "<h3>Ready</h3><p>Send an issue key, a request in plain words, \
                 or <code>/help</code> for the command list.</p>"
                    .into(),
            ),
            Command::Help => Ok(HELP.into()),
            Command::Issues => {
                progress
                    .update("fetching issues", StepStatus::InProgress, None)
                    .await;
                let issues = self.tracker.list_issues().await?;
                progress
                    .update("fetching issues", StepStatus::Completed, None)
                    .await;
                Ok(render_issue_list(&issues))
            }
            Command::Issue { key } => {
                let issue = self.tracker.get_issue(&key).await?;
                Ok(render_issue(&issue))
            }
            Command::Create { title } => {
                progress
                    .update("creating issue", StepStatus::InProgress, Some(&title))
                    .await;
                let issue = self.tracker.create_issue(&title, None).await?;
                progress
                    .update("creating issue", StepStatus::Completed, None)
                    .await;
                Ok(format!(
                    "<p>Created <a href=\"{}\"><b>{}</b></a>: {}</p>",
                    issue.url, issue.key, issue.title
                ))
            }
            Command::Comment { key, text } => {
                let comment = self.tracker.add_comment(&key, &text).await?;
                Ok(format!(
                    "<p>Comment added to <b>{key}</b> by {}.</p>",
                    comment.author
                ))
            }
            Command::Prs => {
                let Some(forge) = &self.forge else {
                    return Ok(not_configured("source hosting"));
                };
                let prs = forge.list_pull_requests().await?;
                Ok(render_pr_list(&prs))
            }
            Command::Tasks => {
                let Some(runner) = &self.runner else {
                    return Ok(not_configured("task runner"));
                };
                let jobs = runner.list_jobs().await?;
                Ok(render_job_list(&jobs))
            }
            Command::Run { job } => {
                let Some(runner) = &self.runner else {
                    return Ok(not_configured("task runner"));
                };
                progress
                    .update("dispatching job", StepStatus::InProgress, Some(&job))
                    .await;
                let job = runner.dispatch(&job).await?;
                progress
                    .update("dispatching job", StepStatus::Completed, None)
                    .await;
                Ok(format!(
                    "<p>Job <b>{}</b> dispatched with id <code>{}</code> (status: {}).</p>",
                    job.name, job.id, job.status
                ))
            }
        }
    }
}

/// Render a remote-API failure as a user-facing notice.
pub fn render_error(err: &Error) -> String {
    tracing::warn!(error = %err, "request failed");
    format!("The request failed: {err}")
}

fn not_configured(what: &str) -> String {
    format!("<p>No {what} is configured for this bot.</p>")
}

fn render_issue_list(issues: &[crate::tracker::Issue]) -> String {
    if issues.is_empty() {
        return "<p>No open issues.</p>".into();
    }
    let mut out = String::from("<h3>Open issues</h3><ul>");
    for issue in issues {
        out.push_str(&format!(
            "<li><a href=\"{}\"><b>{}</b></a> {} ({})</li>",
            issue.url, issue.key, issue.title, issue.state
        ));
    }
    out.push_str("</ul>");
    out
}

fn render_issue(issue: &crate::tracker::Issue) -> String {
    let mut out = format!(
        "<h3>{} {}</h3><p><b>State:</b> {}</p>",
        issue.key, issue.title, issue.state
    );
    if let Some(assignee) = &issue.assignee {
        out.push_str(&format!("<p><b>Assignee:</b> {assignee}</p>"));
    }
    if let Some(description) = &issue.description {
        out.push_str(&format!("<p>{description}</p>"));
    }
    out.push_str(&format!("<p><a href=\"{}\">Open in tracker</a></p>", issue.url));
    out
}

fn render_pr_list(prs: &[crate::forge::PullRequest]) -> String {
    if prs.is_empty() {
        return "<p>No open pull requests.</p>".into();
    }
    let mut out = String::from("<h3>Open pull requests</h3><ul>");
    for pr in prs {
        let draft = if pr.draft { " (draft)" } else { "" };
        out.push_str(&format!(
            "<li><a href=\"{}\"><b>#{}</b></a> {}{} by {}</li>",
            pr.url, pr.number, pr.title, draft, pr.author
        ));
    }
    out.push_str("</ul>");
    out
}

fn render_job_list(jobs: &[crate::runner::Job]) -> String {
    if jobs.is_empty() {
        return "<p>No recent jobs.</p>".into();
    }
    let mut out = String::from("<h3>Recent jobs</h3><ul>");
    for job in jobs {
        out.push_str(&format!(
            "<li><b>{}</b> <code>{}</code> {}</li>",
            job.name, job.id, job.status
        ));
    }
    out.push_str("</ul>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_goes_to_the_agent() {
        assert_eq!(
            parse("what changed in ENG-12 yesterday?"),
            Parsed::Chat("what changed in ENG-12 yesterday?".into())
        );
    }

    #[test]
    fn bare_commands_parse() {
        assert_eq!(parse("/issues"), Parsed::Command(Command::Issues));
        assert_eq!(parse("/prs"), Parsed::Command(Command::Prs));
        assert_eq!(parse("/help"), Parsed::Command(Command::Help));
    }

    #[test]
    fn command_with_bot_username_suffix_parses() {
        assert_eq!(parse("/issues@issuebot"), Parsed::Command(Command::Issues));
    }

    #[test]
    fn issue_command_takes_a_key() {
        assert_eq!(
            parse("/issue ENG-142"),
            Parsed::Command(Command::Issue {
                key: "ENG-142".into()
            })
        );
    }

    #[test]
    fn create_keeps_the_whole_title() {
        assert_eq!(
            parse("/create Login page 500s on empty password"),
            Parsed::Command(Command::Create {
                title: "Login page 500s on empty password".into()
            })
        );
    }

    #[test]
    fn comment_splits_key_from_text() {
        assert_eq!(
            parse("/comment ENG-142 deploy went out at noon"),
            Parsed::Command(Command::Comment {
                key: "ENG-142".into(),
                text: "deploy went out at noon".into()
            })
        );
    }

    #[test]
    fn missing_arguments_yield_usage_notices() {
        assert!(matches!(parse("/issue"), Parsed::Invalid(_)));
        assert!(matches!(parse("/comment ENG-142"), Parsed::Invalid(_)));
        assert!(matches!(parse("/run  "), Parsed::Invalid(_)));
    }

    #[test]
    fn unknown_command_points_at_help() {
        let Parsed::Invalid(notice) = parse("/frobnicate now") else {
            panic!("should be invalid");
        };
        assert!(notice.contains("/frobnicate"));
        assert!(notice.contains("/help"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse("  /tasks  "), Parsed::Command(Command::Tasks));
    }
}

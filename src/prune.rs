//! Decides, thread by thread, whether a notification is still relevant.

use std::io;

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    domain::{NotificationMetadata, Outcome, PruneSummary},
    error::PruneError,
    extract::extract,
    github::AssigneeOracle,
    gmail::{GmailError, MailTransport},
};

pub fn delete_prompt(metadata: &NotificationMetadata) -> String {
    format!(
        "Delete message from '{}' with subject '{}'?",
        metadata.sender, metadata.subject
    )
}

/// Deletes a thread only when the user is no longer assigned to its pull
/// request and the operator confirms.
pub fn evaluate_and_prune<O, C, D>(
    thread_id: &str,
    metadata: Option<&NotificationMetadata>,
    oracle: &O,
    mut confirm: C,
    mut delete: D,
) -> Result<Outcome, PruneError>
where
    O: AssigneeOracle + ?Sized,
    C: FnMut(&str) -> io::Result<bool>,
    D: FnMut(&str) -> Result<(), GmailError>,
{
    let Some(metadata) = metadata else {
        return Ok(Outcome::Skipped);
    };

    let reference = metadata.reference()?;
    if oracle.is_assignee(&reference.repo, reference.number)? {
        debug!(thread_id, pull_request = %reference, "still assigned");
        return Ok(Outcome::Kept);
    }

    if !confirm(&delete_prompt(metadata))? {
        return Ok(Outcome::Kept);
    }
    delete(thread_id)?;
    Ok(Outcome::Deleted)
}

pub struct Pruner<'a, M: ?Sized, O: ?Sized> {
    config: &'a Config,
    mail: &'a M,
    oracle: &'a O,
}

impl<'a, M, O> Pruner<'a, M, O>
where
    M: MailTransport + ?Sized,
    O: AssigneeOracle + ?Sized,
{
    pub fn new(config: &'a Config, mail: &'a M, oracle: &'a O) -> Self {
        Self {
            config,
            mail,
            oracle,
        }
    }

    /// Processes every thread matching the configured query, one at a time.
    pub fn run<C>(&self, mut confirm: C) -> Result<PruneSummary, PruneError>
    where
        C: FnMut(&str) -> io::Result<bool>,
    {
        info!(query = %self.config.query, "Fetching messages...");
        let thread_ids = self.mail.list_threads(&self.config.query)?;
        info!(count = thread_ids.len(), "Got messages");

        let mut summary = PruneSummary::default();
        for thread_id in &thread_ids {
            summary.examined += 1;
            let thread = self.mail.get_full_thread(thread_id)?;
            let metadata = extract(&thread, &self.config.subject_marker)?;

            let decision = evaluate_and_prune(
                thread_id,
                metadata.as_ref(),
                self.oracle,
                &mut confirm,
                |id| self.mail.delete_thread(id),
            );
            match decision {
                Ok(outcome) => {
                    debug!(thread_id = %thread_id, outcome = outcome.label(), "thread processed");
                    summary.record(outcome);
                }
                Err(PruneError::UnparseableReference(err)) => {
                    warn!(thread_id = %thread_id, "{err}; leaving thread untouched");
                    summary.unparseable += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(summary)
    }
}

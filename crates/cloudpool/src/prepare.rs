//! Brings every pool member into a known software state before work is dispatched to it.
use bstr::ByteSlice;

use crate::common::error::PoolError;
use crate::pool::Member;
use crate::remote::RemoteShell;

/// Commands that switch the repository checkout on a node to the given branch.
pub fn checkout_branch_commands(repository_dir: &str, branch: &str) -> Vec<String> {
    vec![
        format!("cd {repository_dir}"),
        "git stash".to_string(),
        format!("git checkout {branch}"),
        "git pull".to_string(),
    ]
}

/// Runs the commands on every member, one member at a time, in a single remote invocation per
/// member.
///
/// Stops at the first member where the invocation exits with a nonzero status; the remaining
/// members are never contacted.
pub async fn prepare_nodes(
    members: &[Member],
    commands: &[String],
    shell: &dyn RemoteShell,
) -> crate::Result<()> {
    let command = commands.join(" ; ");
    for member in members {
        let address = member.address.as_deref().ok_or_else(|| {
            PoolError::GenericError(format!("Member {} has no network address", member.id))
        })?;
        log::info!("Preparing member {member}");

        let output = shell
            .execute(address, &command)
            .await
            .map_err(PoolError::RemoteError)?;
        if !output.is_success() {
            log::error!(
                "Preparation of member {member} failed with exit code {}",
                output.status
            );
            return Err(PoolError::PreparationFailed {
                member: member.id.clone(),
                address: address.to_string(),
                status: output.status,
                stderr: output.stderr_lossy(),
            });
        }
        log::debug!(
            "Member {member} prepared: {}",
            output.stdout.to_str_lossy().trim()
        );
    }
    Ok(())
}

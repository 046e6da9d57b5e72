//! Role gates for rule administration and messaging.
//!
//! Each operation names the roles that may invoke it. Deciding a rule adds a
//! scope check: managers may only decide rules that touch their own group.

use std::fmt;

use commgate_core::{CommunicationRule, Principal, PrincipalId, Role};

use crate::error::{PolicyError, Result};

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const ADMIN_OR_MANAGER: &[Role] = &[Role::Admin, Role::Manager];
const ANY_ROLE: &[Role] = &Role::ALL;

/// Operations subject to a role gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreatePermanentRule,
    DeleteRule,
    RequestTemporaryRule,
    DecideRule,
    ListPendingRules,
    ListRules,
    Evaluate,
    Communicable,
    SendMessage,
    ReadMessages,
    SearchRecipients,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreatePermanentRule => "create_permanent_rule",
            Operation::DeleteRule => "delete_rule",
            Operation::RequestTemporaryRule => "request_temporary_rule",
            Operation::DecideRule => "decide_rule",
            Operation::ListPendingRules => "list_pending_rules",
            Operation::ListRules => "list_rules",
            Operation::Evaluate => "evaluate",
            Operation::Communicable => "communicable",
            Operation::SendMessage => "send_message",
            Operation::ReadMessages => "read_messages",
            Operation::SearchRecipients => "search_recipients",
        }
    }

    /// Roles permitted to invoke this operation.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::CreatePermanentRule | Operation::DeleteRule => ADMIN_ONLY,
            Operation::DecideRule | Operation::ListPendingRules => ADMIN_OR_MANAGER,
            Operation::RequestTemporaryRule
            | Operation::ListRules
            | Operation::Evaluate
            | Operation::Communicable
            | Operation::SendMessage
            | Operation::ReadMessages
            | Operation::SearchRecipients => ANY_ROLE,
        }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `actor`'s role may invoke `operation`.
pub fn authorize(actor: &Principal, operation: Operation) -> Result<()> {
    if operation.permits(actor.role) {
        return Ok(());
    }

    let allowed: Vec<&str> = operation.allowed_roles().iter().map(Role::as_str).collect();
    tracing::warn!(
        actor = %actor.id,
        role = %actor.role,
        operation = %operation,
        "operation denied by role gate"
    );
    Err(PolicyError::Forbidden(format!(
        "{} requires role {}; principal {} is {}",
        operation,
        allowed.join(" or "),
        actor.id,
        actor.role
    )))
}

/// Check that `actor` may approve or reject `rule`.
///
/// Admins may decide any rule. Managers may decide rules with their own
/// group on either side.
pub fn authorize_decision(actor: &Principal, rule: &CommunicationRule) -> Result<()> {
    authorize(actor, Operation::DecideRule)?;

    if actor.is_admin() || rule.touches(actor.group_id) {
        return Ok(());
    }

    tracing::warn!(actor = %actor.id, rule = %rule.id, "decision outside manager scope");
    Err(PolicyError::Forbidden(format!(
        "principal {} may only decide rules involving group {}",
        actor.id, actor.group_id
    )))
}

/// Check that `actor` is acting on their own behalf.
pub fn authorize_self(actor: &Principal, subject: PrincipalId) -> Result<()> {
    if actor.id == subject {
        Ok(())
    } else {
        Err(PolicyError::Forbidden(format!(
            "principal {} cannot act as principal {}",
            actor.id, subject
        )))
    }
}

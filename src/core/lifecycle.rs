use chrono::{DateTime, Utc};

use crate::error::MatchError;
use crate::models::{MatchRequest, MatchStatus, UserId};

/// Move a pending request to ACCEPTED or REJECTED on behalf of its receiver
///
/// Transitions are one-shot: once answered, every further response fails
/// with `AlreadyResponded`, whoever sends it.
pub fn respond(
    request: &MatchRequest,
    responder_id: UserId,
    accept: bool,
    now: DateTime<Utc>,
) -> Result<MatchRequest, MatchError> {
    if request.status != MatchStatus::Pending {
        return Err(MatchError::AlreadyResponded(request.id));
    }
    if request.receiver_id != responder_id {
        return Err(MatchError::Forbidden(
            "only the receiver can respond to a match request".to_string(),
        ));
    }

    let mut next = request.clone();
    next.responded_at = Some(now);
    if accept {
        next.status = MatchStatus::Accepted;
        next.accepted_at = Some(now);
    } else {
        next.status = MatchStatus::Rejected;
    }
    Ok(next)
}

/// Withdraw a pending request; only its requester may do so
pub fn cancel_pending(
    request: &MatchRequest,
    caller_id: UserId,
    now: DateTime<Utc>,
) -> Result<MatchRequest, MatchError> {
    if request.requester_id != caller_id {
        return Err(MatchError::Forbidden(
            "only the requester can cancel a match request".to_string(),
        ));
    }
    if request.status != MatchStatus::Pending {
        return Err(MatchError::AlreadyResponded(request.id));
    }

    let mut next = request.clone();
    next.status = MatchStatus::Cancelled;
    next.responded_at = Some(now);
    Ok(next)
}

/// Call off an accepted match; either party may do so
pub fn cancel_accepted(
    request: &MatchRequest,
    caller_id: UserId,
) -> Result<MatchRequest, MatchError> {
    if !request.involves(caller_id) {
        return Err(MatchError::Forbidden(
            "only a party to the match can cancel it".to_string(),
        ));
    }
    if request.status != MatchStatus::Accepted {
        return Err(MatchError::NotAccepted(request.id));
    }

    let mut next = request.clone();
    next.status = MatchStatus::Cancelled;
    next.merge = None;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pending() -> MatchRequest {
        MatchRequest {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            requester_plan_id: None,
            receiver_plan_id: None,
            status: MatchStatus::Pending,
            message: None,
            created_at: Utc::now(),
            responded_at: None,
            accepted_at: None,
            merge: None,
            version: 0,
        }
    }

    #[test]
    fn test_accept_sets_timestamps() {
        let request = pending();
        let now = Utc::now();
        let next = respond(&request, request.receiver_id, true, now).unwrap();

        assert_eq!(next.status, MatchStatus::Accepted);
        assert_eq!(next.responded_at, Some(now));
        assert_eq!(next.accepted_at, Some(now));
    }

    #[test]
    fn test_requester_cannot_respond() {
        let request = pending();
        let err = respond(&request, request.requester_id, true, Utc::now()).unwrap_err();
        assert!(matches!(err, MatchError::Forbidden(_)));
    }

    #[test]
    fn test_second_response_fails() {
        let request = pending();
        let rejected = respond(&request, request.receiver_id, false, Utc::now()).unwrap();
        assert_eq!(rejected.status, MatchStatus::Rejected);
        assert!(rejected.accepted_at.is_none());

        let err = respond(&rejected, rejected.receiver_id, true, Utc::now()).unwrap_err();
        assert!(matches!(err, MatchError::AlreadyResponded(_)));

        let err = respond(&rejected, rejected.requester_id, true, Utc::now()).unwrap_err();
        assert!(matches!(err, MatchError::AlreadyResponded(_)));
    }

    #[test]
    fn test_cancel_pending_only_by_requester() {
        let request = pending();
        assert!(matches!(
            cancel_pending(&request, request.receiver_id, Utc::now()),
            Err(MatchError::Forbidden(_))
        ));

        let cancelled = cancel_pending(&request, request.requester_id, Utc::now()).unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
        assert!(cancelled.responded_at.is_some());
    }

    #[test]
    fn test_cancel_accepted_requires_accepted() {
        let request = pending();
        assert!(matches!(
            cancel_accepted(&request, request.requester_id),
            Err(MatchError::NotAccepted(_))
        ));

        let accepted = respond(&request, request.receiver_id, true, Utc::now()).unwrap();
        assert!(matches!(
            cancel_accepted(&accepted, Uuid::new_v4()),
            Err(MatchError::Forbidden(_))
        ));
        let cancelled = cancel_accepted(&accepted, accepted.receiver_id).unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
        assert_eq!(cancelled.accepted_at, accepted.accepted_at);
    }
}

use crate::models::{MergeReceipt, TravelPlanSnapshot};

/// Keeps headcount and recruiting flags consistent across accepted matches
///
/// The ledger only computes new plan states; the caller persists both plans
/// in a single transaction.
pub struct CapacityLedger;

impl CapacityLedger {
    /// Fold the sender's group into the receiver's plan
    ///
    /// The sender's plan stops recruiting unconditionally. The receiver's
    /// plan grows by the sender's headcount and stops recruiting once it is
    /// at or over its target.
    pub fn merge(
        sender: &mut TravelPlanSnapshot,
        receiver: &mut TravelPlanSnapshot,
    ) -> MergeReceipt {
        let receipt = MergeReceipt {
            sender_headcount: sender.current_headcount,
            sender_was_recruiting: sender.recruiting,
            receiver_was_recruiting: receiver.recruiting,
        };

        sender.recruiting = false;

        receiver.current_headcount = receiver
            .current_headcount
            .saturating_add(receipt.sender_headcount);
        if receiver.current_headcount >= receiver.target_size {
            receiver.recruiting = false;
        }

        receipt
    }

    /// Undo a previous [`CapacityLedger::merge`]
    ///
    /// The sender's headcount comes back out of the receiver's plan and both
    /// recruiting flags return to what they were before the merge, except
    /// that a receiver still at or over target stays closed.
    pub fn reverse(
        sender: &mut TravelPlanSnapshot,
        receiver: &mut TravelPlanSnapshot,
        receipt: &MergeReceipt,
    ) {
        receiver.current_headcount = receiver
            .current_headcount
            .saturating_sub(receipt.sender_headcount);

        sender.recruiting = receipt.sender_was_recruiting;
        receiver.recruiting = receipt.receiver_was_recruiting && receiver.has_capacity();
    }
}

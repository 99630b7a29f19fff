//! Assertions over the provenance invariants.

use alkrecon_common::{CaseSnapshot, EvidenceId, MechanismClass};

/// Ledger ids are 1..=n with no gaps, every flag has a matching entry and
/// the snapshot audit passes.
pub fn assert_provenance(snapshot: &CaseSnapshot) {
    let ledger = snapshot.ledger();
    for (i, entry) in ledger.entries().iter().enumerate() {
        assert_eq!(entry.evidence_id, EvidenceId(i as u32 + 1), "ledger id gap at position {i}");
    }
    assert!(
        ledger.len() >= snapshot.features().len(),
        "{} flags but only {} ledger entries",
        snapshot.features().len(),
        ledger.len()
    );
    for flag in snapshot.features().iter() {
        assert!(
            ledger.entries_for(&flag.name).next().is_some(),
            "flag {} has no ledger entry",
            flag.name
        );
    }
    if let Err(e) = snapshot.audit() {
        panic!("audit failed for {}: {e}", snapshot.key());
    }
}

pub fn score_of(snapshot: &CaseSnapshot, class: MechanismClass) -> f64 {
    snapshot
        .mechanism_scores()
        .iter()
        .find(|s| s.class == class)
        .map(|s| s.score)
        .unwrap_or_else(|| panic!("{class} missing from mechanism scores"))
}

pub fn top_class(snapshot: &CaseSnapshot) -> MechanismClass {
    snapshot
        .mechanism_scores()
        .first()
        .map(|s| s.class)
        .unwrap_or_else(|| panic!("{} has not been scored", snapshot.key()))
}

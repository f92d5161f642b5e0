//! Reconciliation of the three guardian slots against the backend collection.

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Guardian, GuardianDetails, GuardianId, GuardianPayload, Relationship};
use super::gateway::{AdmissionsGateway, GatewayError};

/// One local guardian slot. `synced` remembers what the backend last confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianSlot {
    pub relationship: Relationship,
    pub remote_id: Option<GuardianId>,
    pub details: GuardianDetails,
    synced: Option<GuardianPayload>,
}

impl GuardianSlot {
    pub fn empty(relationship: Relationship) -> Self {
        Self {
            relationship,
            remote_id: None,
            details: GuardianDetails::default(),
            synced: None,
        }
    }

    pub fn from_remote(guardian: &Guardian) -> Self {
        let mut slot = Self {
            relationship: guardian.relationship,
            remote_id: Some(guardian.id.clone()),
            details: guardian.details(),
            synced: None,
        };
        slot.synced = payload_for(&slot);
        slot
    }

    fn absorb(&mut self, guardian: Guardian) {
        self.details = guardian.details();
        self.remote_id = Some(guardian.id);
        self.synced = payload_for(self);
    }

    fn forget_remote(&mut self) {
        self.remote_id = None;
        self.synced = None;
    }
}

/// The fixed Father, Mother, Guardian slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianRoster {
    slots: [GuardianSlot; 3],
}

impl Default for GuardianRoster {
    fn default() -> Self {
        Self {
            slots: Relationship::ordered().map(GuardianSlot::empty),
        }
    }
}

impl GuardianRoster {
    /// Seeds the slots from the remote collection. At most one record per
    /// relationship is kept; extras are logged and ignored.
    pub fn from_remote(guardians: &[Guardian]) -> Self {
        let mut roster = Self::default();
        for guardian in guardians {
            let slot = &mut roster.slots[guardian.relationship.index()];
            if slot.remote_id.is_some() {
                warn!(
                    relationship = guardian.relationship.label(),
                    id = %guardian.id,
                    "duplicate guardian record ignored"
                );
                continue;
            }
            *slot = GuardianSlot::from_remote(guardian);
        }
        roster
    }

    pub fn slot(&self, relationship: Relationship) -> &GuardianSlot {
        &self.slots[relationship.index()]
    }

    pub fn slot_mut(&mut self, relationship: Relationship) -> &mut GuardianSlot {
        &mut self.slots[relationship.index()]
    }

    pub fn slots(&self) -> &[GuardianSlot] {
        &self.slots
    }

    pub fn named_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !slot.details.is_blank())
            .count()
    }
}

/// Decision for a single slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    NoOp,
    Create(GuardianPayload),
    Update(GuardianId, GuardianPayload),
    Delete(GuardianId),
}

/// Maps a slot to its backend payload; `None` when the name is blank.
pub fn payload_for(slot: &GuardianSlot) -> Option<GuardianPayload> {
    let details = &slot.details;
    let full_name = details.full_name.trim();
    if full_name.is_empty() {
        return None;
    }

    Some(GuardianPayload {
        relationship: slot.relationship,
        full_name: full_name.to_string(),
        address: optional(&details.address),
        phone: optional(&details.phone),
        occupation: optional(&details.occupation),
        last_education: optional(&details.last_education),
        income_bracket: optional(&details.income_bracket),
    })
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Pure create/update/delete decision for one slot.
///
/// A blank name deletes an existing remote record and otherwise does nothing.
/// A named slot updates its remote record or creates one. A slot whose payload
/// matches what the backend last confirmed is left alone.
pub fn decide(slot: &GuardianSlot) -> SyncAction {
    match (payload_for(slot), &slot.remote_id) {
        (None, Some(id)) => SyncAction::Delete(id.clone()),
        (None, None) => SyncAction::NoOp,
        (Some(payload), Some(_)) if slot.synced.as_ref() == Some(&payload) => SyncAction::NoOp,
        (Some(payload), Some(id)) => SyncAction::Update(id.clone(), payload),
        (Some(payload), None) => SyncAction::Create(payload),
    }
}

/// What actually happened to a slot during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "id", rename_all = "snake_case")]
pub enum SlotResult {
    Unchanged,
    Created(GuardianId),
    Updated(GuardianId),
    Deleted(GuardianId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotOutcome {
    pub relationship: Relationship,
    pub result: SlotResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<SlotOutcome>,
}

impl SyncReport {
    pub fn writes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result != SlotResult::Unchanged)
            .count()
    }
}

/// Sync aborted at `relationship`; slots before it were already written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not save {relationship} details: {}", .source.user_message())]
pub struct GuardianSyncError {
    pub relationship: Relationship,
    pub completed: Vec<SlotOutcome>,
    #[source]
    pub source: GatewayError,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GuardianSyncEngine;

impl GuardianSyncEngine {
    pub fn plan(&self, roster: &GuardianRoster) -> Vec<(Relationship, SyncAction)> {
        Relationship::ordered()
            .into_iter()
            .map(|relationship| (relationship, decide(roster.slot(relationship))))
            .collect()
    }

    /// Executes the decisions one slot at a time in Father, Mother, Guardian
    /// order, refreshing each slot from the backend response. The first failure
    /// stops the sequence.
    pub fn sync<G>(
        &self,
        gateway: &G,
        roster: &mut GuardianRoster,
    ) -> Result<SyncReport, GuardianSyncError>
    where
        G: AdmissionsGateway + ?Sized,
    {
        let mut report = SyncReport::default();

        for relationship in Relationship::ordered() {
            let slot = roster.slot_mut(relationship);
            let action = decide(slot);
            let result = match Self::apply(gateway, slot, action) {
                Ok(result) => result,
                Err(source) => {
                    warn!(relationship = relationship.label(), error = %source, "guardian sync aborted");
                    return Err(GuardianSyncError {
                        relationship,
                        completed: report.outcomes,
                        source,
                    });
                }
            };
            info!(relationship = relationship.label(), ?result, "guardian slot reconciled");
            report.outcomes.push(SlotOutcome {
                relationship,
                result,
            });
        }

        Ok(report)
    }

    fn apply<G>(
        gateway: &G,
        slot: &mut GuardianSlot,
        action: SyncAction,
    ) -> Result<SlotResult, GatewayError>
    where
        G: AdmissionsGateway + ?Sized,
    {
        match action {
            SyncAction::NoOp => Ok(SlotResult::Unchanged),
            SyncAction::Create(payload) => {
                let created = gateway.create_guardian(&payload)?;
                let id = created.id.clone();
                slot.absorb(created);
                Ok(SlotResult::Created(id))
            }
            SyncAction::Update(id, payload) => {
                let updated = gateway.update_guardian(&id, &payload)?;
                let id = updated.id.clone();
                slot.absorb(updated);
                Ok(SlotResult::Updated(id))
            }
            SyncAction::Delete(id) => {
                match gateway.delete_guardian(&id) {
                    Ok(()) => {}
                    // Already gone, e.g. a retried finalize after a lost response.
                    Err(GatewayError::NotFound { .. }) => {}
                    Err(err) => return Err(err),
                }
                slot.forget_remote();
                Ok(SlotResult::Deleted(id))
            }
        }
    }
}

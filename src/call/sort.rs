//! Stability-biased participant ordering.
//!
//! The engine keeps video tiles from jumping around: participants already on
//! screen keep their relative positions unless a comparator-relevant field
//! changed, newcomers append at the end, and an ordering identical to the
//! previously published one is suppressed entirely.

use log::trace;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::watch;

use super::participant::{Participant, PinMap};

/// Ordering criterion. Consults the pin map read-only.
pub type Comparator = Box<dyn Fn(&Participant, &Participant, &PinMap) -> Ordering + Send + Sync>;

/// The standard tile ordering.
///
/// When either side is not currently visible on screen (offscreen or unknown
/// visibility), participants are ranked by user id, join time, audio, video
/// and dominant-speaker status; two visible participants skip that stage so
/// that live tiles are not shuffled by chatter in those fields. Screen
/// sharers, then pinned participants, then lower-ranked ingest sources win
/// the remaining ties.
pub fn default_comparator() -> Comparator {
    Box::new(|a, b, pins| {
        let mut ordering = Ordering::Equal;
        if !(a.is_visible() && b.is_visible()) {
            ordering = a
                .user_id
                .cmp(&b.user_id)
                .then_with(|| a.joined_at.cmp(&b.joined_at))
                .then_with(|| b.audio_enabled.cmp(&a.audio_enabled))
                .then_with(|| b.video_enabled.cmp(&a.video_enabled))
                .then_with(|| b.dominant_speaker.cmp(&a.dominant_speaker));
        }
        ordering
            .then_with(|| b.screen_sharing_enabled.cmp(&a.screen_sharing_enabled))
            .then_with(|| {
                let a_pinned = pins.contains_key(&a.session_id);
                let b_pinned = pins.contains_key(&b.session_id);
                b_pinned.cmp(&a_pinned)
            })
            .then_with(|| a.source.cmp(&b.source))
    })
}

/// Maintains the rendered participant order across live updates.
///
/// Triggers must be delivered sequentially from a single task; the engine
/// keeps its previous-order memory unlocked on that assumption. Consumers
/// read through a watch channel, so a slow consumer only ever observes the
/// newest ordering (intermediate ones are dropped).
pub struct ParticipantSortEngine {
    comparator: Comparator,
    last_order: Vec<String>,
    tx: watch::Sender<Vec<Participant>>,
}

impl ParticipantSortEngine {
    pub fn new() -> Self {
        Self::with_comparator(default_comparator())
    }

    pub fn with_comparator(comparator: Comparator) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            comparator,
            last_order: Vec::new(),
            tx,
        }
    }

    /// Stream of orderings. Only actual order changes are published.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Participant>> {
        self.tx.subscribe()
    }

    /// Session ids of the most recently published order. Stays queryable
    /// after all subscribers are gone.
    pub fn last_sort_order(&self) -> Vec<String> {
        self.last_order.clone()
    }

    /// Replaces the ordering criterion. Takes effect on the next trigger;
    /// nothing is re-sorted retroactively.
    pub fn update_comparator(&mut self, comparator: Comparator) {
        self.comparator = comparator;
    }

    /// Processes one trigger: a participant map change, a pin change, or a
    /// call event. Publishes the new ordering unless it is identical to the
    /// previous one.
    pub fn process(&mut self, participants: &BTreeMap<String, Participant>, pins: &PinMap) {
        // Stabilized base: survivors keep their previous relative order,
        // newcomers append in map-iteration order.
        let mut base: Vec<&Participant> = self
            .last_order
            .iter()
            .filter_map(|session_id| participants.get(session_id))
            .collect();
        let known: HashSet<&str> = self.last_order.iter().map(String::as_str).collect();
        for (session_id, participant) in participants {
            if !known.contains(session_id.as_str()) {
                base.push(participant);
            }
        }

        // Stable sort, so comparator ties preserve the stabilized order.
        base.sort_by(|a, b| (self.comparator)(a, b, pins));

        let order: Vec<String> = base.iter().map(|p| p.session_id.clone()).collect();
        if order == self.last_order {
            trace!(target: "Call/Sort", "Order unchanged, suppressing emission");
            return;
        }

        let list: Vec<Participant> = base.into_iter().cloned().collect();
        self.last_order = order;
        self.tx.send_replace(list);
    }
}

impl Default for ParticipantSortEngine {
    fn default() -> Self {
        Self::new()
    }
}

//! Queue family matching and queue layout planning
//!
//! Matching picks, for each requested capability mask, the family whose mask
//! is a superset with the fewest extra bits. Families with a free queue slot
//! are preferred; once every qualifying family is exhausted the request falls
//! back to the best exhausted family and will alias an existing queue there.

use crate::backend::QueueCreateDesc;
use crate::types::{QueueCapabilities, QueueFamilyInfo};

/// A queue family as seen during matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySlots {
    /// Hardware capabilities, plus PRESENT when the family can present to the surface
    pub capabilities: QueueCapabilities,
    /// Queues the family exposes
    pub queue_count: u32,
    /// Queues not yet claimed by a request
    pub remaining: u32,
}

impl FamilySlots {
    /// Family entry with all queues free
    pub fn new(info: QueueFamilyInfo, can_present: bool) -> Self {
        let mut capabilities = info.capabilities - QueueCapabilities::PRESENT;
        if can_present {
            capabilities |= QueueCapabilities::PRESENT;
        }
        Self {
            capabilities,
            queue_count: info.queue_count,
            remaining: info.queue_count,
        }
    }

    fn satisfies(&self, requested: QueueCapabilities) -> bool {
        self.queue_count > 0 && self.capabilities.contains(requested)
    }
}

/// Index of the most specialized family able to serve `requested`
///
/// Ties go to the lowest family index.
pub fn find_family(families: &[FamilySlots], requested: QueueCapabilities) -> Option<usize> {
    let best_where = |with_free_slot: bool| {
        families
            .iter()
            .enumerate()
            .filter(|(_, family)| family.satisfies(requested) && (!with_free_slot || family.remaining > 0))
            .min_by_key(|(index, family)| (family.capabilities.symmetric_difference_count(requested), *index))
            .map(|(index, _)| index)
    };

    best_where(true).or_else(|| best_where(false))
}

/// Match every request in order, consuming family slots as it goes
///
/// Returns one entry per request: the chosen family or `None` if no family
/// has the requested capabilities.
pub fn match_requests(families: &mut [FamilySlots], requests: &[QueueCapabilities]) -> Vec<Option<u32>> {
    requests
        .iter()
        .map(|&requested| {
            let index = find_family(families, requested)?;
            let family = &mut families[index];
            family.remaining = family.remaining.saturating_sub(1);
            u32::try_from(index).ok()
        })
        .collect()
}

/// Where one supported request's queue comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSlot {
    /// Queue family
    pub family_index: u32,
    /// Queue index within the family
    pub queue_index: u32,
    /// Request whose queue this one reuses, when the family ran out of queues
    pub alias_of: Option<usize>,
}

/// Queue creation descriptors plus a slot for every request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueLayout {
    /// One descriptor per distinct family, in order of first use
    pub create_descs: Vec<QueueCreateDesc>,
    /// Per request: its slot, or `None` for unsupported requests
    pub slots: Vec<Option<QueueSlot>>,
}

/// Group assigned requests by family and decide which get their own queue
///
/// `assignments[i]` is request `i`'s family and `priorities[i]` its priority.
/// The k-th request of a family gets queue `k` while the family has queues
/// left; later ones alias the request holding queue `k % queue_count`.
pub fn plan_queue_layout(
    assignments: &[Option<u32>],
    priorities: &[f32],
    families: &[QueueFamilyInfo],
) -> QueueLayout {
    let mut layout = QueueLayout {
        create_descs: Vec::new(),
        slots: vec![None; assignments.len()],
    };
    // (family, requests owning queue 0..n in that family)
    let mut owners: Vec<(u32, Vec<usize>)> = Vec::new();

    for (request_index, family_index) in assignments.iter().enumerate() {
        let Some(family_index) = *family_index else {
            continue;
        };
        let queue_count = families
            .get(family_index as usize)
            .map_or(0, |family| family.queue_count)
            .max(1);

        let group = match owners.iter().position(|(family, _)| *family == family_index) {
            Some(position) => position,
            None => {
                owners.push((family_index, Vec::new()));
                layout.create_descs.push(QueueCreateDesc {
                    family_index,
                    priorities: Vec::new(),
                });
                owners.len() - 1
            }
        };

        let (_, family_owners) = &mut owners[group];
        let seen = u32::try_from(family_owners.len()).unwrap_or(u32::MAX);
        let slot = if seen < queue_count {
            family_owners.push(request_index);
            layout.create_descs[group]
                .priorities
                .push(priorities.get(request_index).copied().unwrap_or(1.0));
            QueueSlot {
                family_index,
                queue_index: seen,
                alias_of: None,
            }
        } else {
            // Every queue is owned; count all requests placed here so far, aliases included
            let placed = layout
                .slots
                .iter()
                .flatten()
                .filter(|slot| slot.family_index == family_index)
                .count();
            let target = family_owners[placed % family_owners.len()];
            QueueSlot {
                family_index,
                queue_index: u32::try_from(placed % family_owners.len()).unwrap_or(0),
                alias_of: Some(target),
            }
        };
        layout.slots[request_index] = Some(slot);
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: QueueCapabilities = QueueCapabilities::GRAPHICS;
    const C: QueueCapabilities = QueueCapabilities::COMPUTE;
    const T: QueueCapabilities = QueueCapabilities::TRANSFER;
    const P: QueueCapabilities = QueueCapabilities::PRESENT;

    fn family(capabilities: QueueCapabilities, queue_count: u32) -> QueueFamilyInfo {
        QueueFamilyInfo {
            capabilities,
            queue_count,
        }
    }

    fn slots(infos: &[QueueFamilyInfo]) -> Vec<FamilySlots> {
        infos.iter().map(|info| FamilySlots::new(*info, false)).collect()
    }

    #[test]
    fn test_prefers_exact_family_over_wider_one() {
        let families = slots(&[family(G | C | T, 4), family(C, 4)]);
        assert_eq!(find_family(&families, C), Some(1));
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let families = slots(&[family(G | T, 1), family(C | T, 1), family(T, 0)]);
        assert_eq!(find_family(&families, T), Some(0));
    }

    #[test]
    fn test_requires_superset() {
        let families = slots(&[family(G, 2), family(C, 2)]);
        assert_eq!(find_family(&families, G | C), None);
    }

    #[test]
    fn test_present_only_counts_where_supported() {
        let mut families = slots(&[family(G, 1), family(G, 1)]);
        families[1] = FamilySlots::new(family(G, 1), true);
        assert_eq!(find_family(&families, G | P), Some(1));
        // A plain graphics request avoids the family carrying the extra PRESENT bit
        assert_eq!(find_family(&families, G), Some(0));
    }

    #[test]
    fn test_free_slot_beats_specialization() {
        let mut families = slots(&[family(G | C | T, 2), family(T, 1)]);
        let assigned = match_requests(&mut families, &[T, T, T]);
        assert_eq!(assigned, vec![Some(1), Some(0), Some(0)]);
        assert_eq!(families[1].remaining, 0);
        assert_eq!(families[0].remaining, 0);
    }

    #[test]
    fn test_exhausted_family_still_matches() {
        let mut families = slots(&[family(G, 1)]);
        let assigned = match_requests(&mut families, &[G, G, G]);
        assert_eq!(assigned, vec![Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn test_unmatched_request_is_none() {
        let mut families = slots(&[family(G, 1)]);
        let assigned = match_requests(&mut families, &[C, G]);
        assert_eq!(assigned, vec![None, Some(0)]);
        assert_eq!(families[0].remaining, 0);
    }

    #[test]
    fn test_layout_aliases_past_queue_count() {
        let infos = [family(G, 1)];
        let layout = plan_queue_layout(&[Some(0), Some(0), Some(0)], &[1.0, 0.5, 0.25], &infos);

        assert_eq!(layout.create_descs.len(), 1);
        assert_eq!(layout.create_descs[0].priorities, vec![1.0]);
        assert_eq!(layout.slots[0].unwrap().alias_of, None);
        assert_eq!(layout.slots[1].unwrap().alias_of, Some(0));
        assert_eq!(layout.slots[2].unwrap().alias_of, Some(0));
    }

    #[test]
    fn test_layout_wraps_round_robin() {
        let infos = [family(G, 2)];
        let layout = plan_queue_layout(&[Some(0); 5], &[1.0; 5], &infos);

        assert_eq!(layout.create_descs[0].priorities.len(), 2);
        let aliases: Vec<_> = layout.slots.iter().map(|s| s.unwrap().alias_of).collect();
        assert_eq!(aliases, vec![None, None, Some(0), Some(1), Some(0)]);
        let indices: Vec<_> = layout.slots.iter().map(|s| s.unwrap().queue_index).collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_layout_groups_by_first_use_and_skips_unsupported() {
        let infos = [family(G, 2), family(C, 2)];
        let layout = plan_queue_layout(&[Some(1), None, Some(0), Some(1)], &[0.9, 1.0, 0.8, 0.7], &infos);

        assert_eq!(layout.create_descs.len(), 2);
        assert_eq!(layout.create_descs[0].family_index, 1);
        assert_eq!(layout.create_descs[0].priorities, vec![0.9, 0.7]);
        assert_eq!(layout.create_descs[1].family_index, 0);
        assert!(layout.slots[1].is_none());
        assert_eq!(layout.slots[3].unwrap().queue_index, 1);
    }
}

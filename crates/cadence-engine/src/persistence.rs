//! Reboot-survivable scheduling: seeding trigger times at attach and
//! writing wait accounts back at checkpoints.
//!
//! Two keys per tagged mode, both little-endian `u32` seconds:
//!
//! | Key            | Meaning                                              |
//! |----------------|------------------------------------------------------|
//! | `R<tag>LT`     | real-time epoch of the last trigger (or last end, for gap-only modes) |
//! | `R<tag>CW`     | cumulative wait since that trigger                   |
//!
//! Without a trustworthy epoch the last trigger is placed a random offset
//! within one period into the past, pushed back further by the persisted
//! wait, so a fleet rebooting together does not fire in lockstep.

use tracing::{debug, warn};

use cadence_core::{JitterRng, Millis, ModeId, MILLIS_PER_SECOND};
use cadence_mode::{Attachment, Attachments, Host, Mode, ModeState, ModeTree, WaitAccount};
use cadence_store::{Store, StoreResult, StoreTag};

/// Seeds freshly attached modes from a store.
pub(crate) struct Seeder<'a> {
    pub store:       Option<&'a mut Box<dyn Store>>,
    pub epoch:       Option<u32>,
    pub jitter_seed: u64,
    pub now:         Millis,
}

impl Seeder<'_> {
    pub fn seed<S: Host>(&mut self, mode: &Mode<S>, ms: &mut ModeState, link: &mut Attachment) {
        if !mode.is_persisted() {
            return;
        }
        let (Some(store), Some(tag)) = (self.store.as_deref_mut(), mode.storage_tag.as_deref()) else {
            return;
        };

        let lt = mode.trigger_key().and_then(|key| load(&mut **store, &key, mode.name));
        let cw = mode.wait_key().and_then(|key| load(&mut **store, &key, mode.name)).unwrap_or(0);
        link.wait = Some(WaitAccount { cumulative_secs: cw, since: self.now });

        match (self.epoch, lt) {
            (Some(epoch), Some(lt)) if lt != 0 && lt <= epoch => {
                let last = self.now.before((epoch - lt).saturating_mul(MILLIS_PER_SECOND));
                ms.last_trigger = Some(last);
                if mode.min_gap != 0 {
                    ms.end_millis = Some(last);
                }
                debug!(target: "cadence::store", mode = mode.name, ago_secs = epoch - lt, "seeded from epoch");
            }
            _ => {
                let jitter = JitterRng::for_tag(self.jitter_seed, tag).below(mode.period());
                let back = cw.saturating_mul(MILLIS_PER_SECOND).saturating_add(jitter);
                ms.last_trigger = Some(self.now.before(back));
                debug!(target: "cadence::store", mode = mode.name, wait_secs = cw, jitter, "seeded with jitter");
            }
        }
    }
}

/// Failures degrade to "never triggered".
fn load(store: &mut dyn Store, key: &str, mode: &str) -> Option<u32> {
    let loaded = StoreTag::new(key).and_then(|tag| store.load_u32(&tag));
    match loaded {
        Ok(value) => value,
        Err(err) => {
            warn!(target: "cadence::store", mode, key, %err, "load failed, treating as absent");
            None
        }
    }
}

/// Credit every wait account up to `now` and write it out, together with
/// the last-trigger epoch when `epoch_now` is known.  Returns the number of
/// modes written.
pub(crate) fn write_checkpoint<S: Host>(
    store:     &mut dyn Store,
    tree:      &ModeTree<S>,
    links:     &mut Attachments,
    state:     &S,
    now:       Millis,
    epoch_now: Option<u32>,
) -> StoreResult<usize> {
    let credited: Vec<(ModeId, u32)> =
        links.waiting().map(|(id, wait)| (id, wait.credit(now))).collect();

    for &(id, cw) in &credited {
        let mode = tree.mode(id);
        if let Some(key) = mode.wait_key() {
            store.save_u32(&StoreTag::new(&key)?, cw)?;
        }
        let (Some(epoch), Some(key)) = (epoch_now, mode.trigger_key()) else {
            continue;
        };
        let ms = state.modes().get(links.slot(id));
        let reference = if mode.period() != 0 { ms.last_trigger } else { ms.end_millis };
        if let Some(at) = reference {
            let lt = epoch.saturating_sub(now.since(at) / MILLIS_PER_SECOND);
            store.save_u32(&StoreTag::new(&key)?, lt)?;
        }
    }
    Ok(credited.len())
}

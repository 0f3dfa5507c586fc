//! Latest-known journal context, shared between the journal reader thread
//! and whoever records observations.
//!
//! Writers are the event handlers (`on_*`); readers take a [`JournalContext`]
//! snapshot. A single mutex guards everything. Z-bin change callbacks are
//! invoked after the lock is released, so a callback may read the manager.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::JournalEvent;
use crate::geometry::{calculate_z_bin, survey_axis, Z_BIN_SIZE};
use crate::note::now_utc_iso;
use crate::types::{JournalContext, ZBinChange, ZTarget};

/// How many z-bin crossings are remembered.
pub const Z_BIN_HISTORY_LIMIT: usize = 100;

pub type CallbackId = u64;
type ZBinCallback = Arc<dyn Fn(&ZBinChange) + Send + Sync>;

struct Inner {
    context: JournalContext,
    history: VecDeque<ZBinChange>,
    callbacks: Vec<(CallbackId, ZBinCallback)>,
    next_callback_id: CallbackId,
}

pub struct JournalStateManager {
    z_bin_size: i64,
    inner: Mutex<Inner>,
}

impl Default for JournalStateManager {
    fn default() -> Self {
        Self::new(Z_BIN_SIZE)
    }
}

impl JournalStateManager {
    pub fn new(z_bin_size: i64) -> Self {
        Self {
            z_bin_size,
            inner: Mutex::new(Inner {
                context: JournalContext::default(),
                history: VecDeque::new(),
                callbacks: Vec::new(),
                next_callback_id: 1,
            }),
        }
    }

    pub fn z_bin_size(&self) -> i64 {
        self.z_bin_size
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn set_session_info(&self, session_id: &str, cmdr_name: &str) {
        let mut inner = self.inner.lock();
        inner.context.session_id = Some(session_id.to_string());
        inner.context.cmdr_name = Some(cmdr_name.to_string());
    }

    /// Forget the session; the commander name survives across sessions.
    pub fn clear_session(&self) {
        self.inner.lock().context.session_id = None;
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    /// Hyperspace arrival. Moves the context to the new system, clears the
    /// last scanned body, and records a z-bin crossing when the bin changed
    /// from a known (non-zero) bin.
    pub fn on_fsd_jump(&self, event: &JournalEvent) {
        let fired = {
            let mut inner = self.inner.lock();
            let old_z_bin = inner.context.z_bin;
            self.apply_position(&mut inner.context, event);
            inner.context.last_scan_body = None;
            stamp_event(&mut inner.context, event);

            let new_z_bin = inner.context.z_bin;
            if old_z_bin != 0 && new_z_bin != old_z_bin {
                let change = ZBinChange {
                    old_z_bin,
                    new_z_bin,
                    system_name: inner.context.system_name.clone().unwrap_or_default(),
                    star_pos: inner.context.star_pos,
                    timestamp: now_utc_iso(),
                };
                inner.history.push_back(change.clone());
                while inner.history.len() > Z_BIN_HISTORY_LIMIT {
                    inner.history.pop_front();
                }
                let callbacks: Vec<ZBinCallback> =
                    inner.callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect();
                Some((change, callbacks))
            } else {
                None
            }
        };

        if let Some((change, callbacks)) = fired {
            for callback in callbacks {
                callback(&change);
            }
        }
    }

    /// Position report on game load. Same as a jump, but keeps the scanned
    /// body and never counts as a bin crossing.
    pub fn on_location(&self, event: &JournalEvent) {
        let mut inner = self.inner.lock();
        self.apply_position(&mut inner.context, event);
        stamp_event(&mut inner.context, event);
    }

    pub fn on_scan(&self, event: &JournalEvent) {
        let mut inner = self.inner.lock();
        inner.context.last_scan_body = event.body_name().map(str::to_string);
        stamp_event(&mut inner.context, event);
    }

    pub fn on_commander(&self, event: &JournalEvent) {
        if let Some(name) = event.commander_name() {
            self.inner.lock().context.cmdr_name = Some(name.to_string());
        }
    }

    fn apply_position(&self, context: &mut JournalContext, event: &JournalEvent) {
        if let Some(pos) = event.star_pos() {
            context.star_pos = pos;
            context.z_bin = calculate_z_bin(survey_axis(pos), self.z_bin_size);
        }
        if let Some(name) = event.star_system() {
            context.system_name = Some(name.to_string());
        }
        if let Some(address) = event.system_address() {
            context.system_address = Some(address);
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn context(&self) -> JournalContext {
        self.inner.lock().context.clone()
    }

    pub fn z_bin(&self) -> i64 {
        self.inner.lock().context.z_bin
    }

    pub fn system_name(&self) -> Option<String> {
        self.inner.lock().context.system_name.clone()
    }

    pub fn z_bin_history(&self) -> Vec<ZBinChange> {
        self.inner.lock().history.iter().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Next-target tracking
    // -----------------------------------------------------------------------

    /// Record the bin of the sample just saved. A move away from the previous
    /// sample bin sets the travel direction.
    pub fn set_last_sample_z_bin(&self, z_bin: i64) {
        let mut inner = self.inner.lock();
        let previous = inner.context.last_sample_z_bin.replace(z_bin);
        if let Some(old) = previous {
            if z_bin != old {
                inner.context.z_direction = if z_bin > old { 1 } else { -1 };
            }
        }
    }

    pub fn set_z_direction(&self, direction: i64) {
        self.inner.lock().context.z_direction = if direction >= 0 { 1 } else { -1 };
    }

    /// Where the next sample should be taken: one bin beyond the last sample
    /// in the travel direction, or one bin beyond the current bin if nothing
    /// has been sampled yet.
    pub fn z_target(&self) -> ZTarget {
        let inner = self.inner.lock();
        let ctx = &inner.context;
        let base = ctx.last_sample_z_bin.unwrap_or(ctx.z_bin);
        ZTarget {
            last_sample_z_bin: ctx.last_sample_z_bin,
            target_z: base + self.z_bin_size * ctx.z_direction,
            direction: ctx.z_direction,
            current_z: survey_axis(ctx.star_pos),
        }
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    pub fn register_z_bin_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&ZBinChange) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_callback_id;
        inner.next_callback_id += 1;
        inner.callbacks.push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unregister_z_bin_callback(&self, id: CallbackId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(cid, _)| *cid != id);
        inner.callbacks.len() != before
    }

    /// Drop all journal-derived state. Registered callbacks stay.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.context = JournalContext::default();
        inner.history.clear();
    }
}

fn stamp_event(context: &mut JournalContext, event: &JournalEvent) {
    context.last_event_id = Some(event.event_id());
    context.last_event_timestamp = Some(event.timestamp().to_string());
}

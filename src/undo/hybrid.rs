//! Group-based undo/redo over the annotation buffer.
//!
//! The manager observes every buffer write. While a group is open it keeps,
//! per element, the class code the element had when the group first touched
//! it. Closing the group compacts those values into an [`UndoGroup`].
//!
//! Undo replays a group through the lock-ignoring write path inside a group
//! of its own, so the values the undo overwrites become the matching redo
//! group. Redo mirrors this.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::retention::{RetentionPolicy, UndoConfig, UndoGroup, human_readable_size, memory_estimate};
use crate::annotation::{AnnotationDiff, AnnotationManager};
use crate::constants::NOT_CAPTURED_CLASS_CODE;
use crate::model::{ClassCode, LabelRef, LabeledSelection};
use crate::observer::{Channel, Subscription};

/// Sizes of both history stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UndoRedoCount {
    pub undo: usize,
    pub redo: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayDirection {
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    Idle,
    /// A user gesture is being recorded
    Recording,
    /// A stored group is being replayed
    Replaying(ReplayDirection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Backward,
    Forward,
}

/// Observation state shared with the annotation subscription.
struct Recorder {
    active: bool,
    recording: bool,
    annotated: bool,
    /// First captured class code per element, or the not-captured marker
    scratch: Vec<ClassCode>,
    /// Elements with a captured value, in capture order
    touched: Vec<u32>,
    /// Every label seen in a diff, by class code
    labels: HashMap<ClassCode, LabelRef>,
}

impl Recorder {
    fn new(element_count: usize) -> Self {
        Self {
            active: true,
            recording: false,
            annotated: false,
            scratch: vec![NOT_CAPTURED_CLASS_CODE; element_count],
            touched: Vec::new(),
            labels: HashMap::new(),
        }
    }

    fn record(&mut self, diff: &AnnotationDiff) {
        if !self.active {
            return;
        }
        self.labels
            .insert(diff.label.class_code(), Rc::clone(&diff.label));
        for label in &diff.previous_labels {
            self.labels.insert(label.class_code(), Rc::clone(label));
        }
        if !self.recording {
            return;
        }

        self.annotated = true;
        for (&index, &previous) in diff.indices.iter().zip(&diff.previous) {
            if let Some(slot) = self.scratch.get_mut(index as usize) {
                if *slot == NOT_CAPTURED_CLASS_CODE {
                    *slot = previous;
                    self.touched.push(index);
                }
            }
        }
    }

    /// Compact the captured values into a group and clear the scratch state.
    fn take_group(&mut self) -> UndoGroup {
        let mut touched = std::mem::take(&mut self.touched);
        touched.sort_unstable();

        let mut slots: HashMap<ClassCode, usize> = HashMap::new();
        let mut selections: Vec<LabeledSelection> = Vec::new();
        let mut unknown = 0;
        for index in touched {
            let class_code = std::mem::replace(&mut self.scratch[index as usize], NOT_CAPTURED_CLASS_CODE);
            let slot = match slots.get(&class_code) {
                Some(&slot) => slot,
                None => match self.labels.get(&class_code) {
                    Some(label) => {
                        selections.push(LabeledSelection::new(Rc::clone(label), Vec::new()));
                        slots.insert(class_code, selections.len() - 1);
                        selections.len() - 1
                    }
                    None => {
                        unknown += 1;
                        continue;
                    }
                },
            };
            selections[slot].indices.push(index);
        }
        if unknown > 0 {
            log::error!(
                "Undo group dropped {} elements overwritten from an unknown class",
                unknown
            );
        }
        self.annotated = false;
        UndoGroup { selections }
    }

    fn clear_scratch(&mut self) {
        for index in self.touched.drain(..) {
            self.scratch[index as usize] = NOT_CAPTURED_CLASS_CODE;
        }
        self.annotated = false;
    }
}

/// Undo manager with switchable static or memory-based retention.
pub struct HybridUndoManager {
    recorder: Rc<RefCell<Recorder>>,
    subscription: Subscription,
    state: GroupState,
    backward: VecDeque<UndoGroup>,
    forward: VecDeque<UndoGroup>,
    config: UndoConfig,
    /// Estimated size of the backward stack, maintained under the memory policy
    memory_used: usize,
    count_observers: Channel<UndoRedoCount>,
}

impl HybridUndoManager {
    /// Create a manager observing `annotations`.
    pub fn new(annotations: &AnnotationManager, config: UndoConfig) -> Self {
        let recorder = Rc::new(RefCell::new(Recorder::new(annotations.element_count())));
        let observer = Rc::clone(&recorder);
        let subscription = annotations.subscribe(move |diff| observer.borrow_mut().record(diff));
        log::debug!(
            "Undo manager created ({:?} policy, {} groups, {})",
            config.policy,
            config.max_undos,
            human_readable_size(config.max_undo_memory)
        );
        Self {
            recorder,
            subscription,
            state: GroupState::Idle,
            backward: VecDeque::new(),
            forward: VecDeque::new(),
            config,
            memory_used: 0,
            count_observers: Channel::new(),
        }
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Open a group for a user gesture. Does nothing if one is already open.
    pub fn start_group(&mut self) {
        match self.state {
            GroupState::Idle => {
                self.state = GroupState::Recording;
                self.recorder.borrow_mut().recording = true;
            }
            GroupState::Recording => {}
            GroupState::Replaying(direction) => {
                log::warn!("Ignoring start_group during {:?} replay", direction);
            }
        }
    }

    /// Close the open gesture group and push it to the undo stack.
    ///
    /// Empty groups are discarded. A non-empty group clears the redo stack.
    pub fn end_group(&mut self) {
        match self.state {
            GroupState::Recording => {
                self.finish_group(Destination::Backward, true);
            }
            GroupState::Idle => {}
            GroupState::Replaying(direction) => {
                log::warn!("Ignoring end_group during {:?} replay", direction);
            }
        }
    }

    pub fn is_grouping(&self) -> bool {
        self.state != GroupState::Idle
    }

    /// Close the open group. Returns true if a group was stored.
    fn finish_group(&mut self, destination: Destination, clear_forward: bool) -> bool {
        self.state = GroupState::Idle;
        let group = {
            let mut recorder = self.recorder.borrow_mut();
            recorder.recording = false;
            if !recorder.annotated {
                recorder.clear_scratch();
                return false;
            }
            recorder.take_group()
        };
        if group.is_empty() {
            return false;
        }

        if clear_forward && !self.forward.is_empty() {
            log::debug!("🗑️ Undo: cleared {} redo groups", self.forward.len());
            self.forward.clear();
        }
        match destination {
            Destination::Backward => self.push_backward(group),
            Destination::Forward => self.forward.push_back(group),
        }
        self.notify_counts();
        true
    }

    fn push_backward(&mut self, group: UndoGroup) {
        match self.config.policy {
            RetentionPolicy::Static => {
                if self.config.max_undos == 0 {
                    log::debug!("Undo: history disabled, dropping group");
                    return;
                }
                while self.backward.len() >= self.config.max_undos {
                    self.backward.pop_front();
                }
                log::debug!("📝 Undo: pushed group of {} elements", group.index_count());
                self.backward.push_back(group);
            }
            RetentionPolicy::Memory => {
                let size = group.memory_estimate();
                if size > self.config.max_undo_memory {
                    log::warn!(
                        "Undo: group of {} exceeds the {} budget, dropping it",
                        human_readable_size(size),
                        human_readable_size(self.config.max_undo_memory)
                    );
                    return;
                }
                while self.memory_used + size > self.config.max_undo_memory {
                    let Some(oldest) = self.backward.pop_front() else {
                        break;
                    };
                    self.memory_used = self.memory_used.saturating_sub(oldest.memory_estimate());
                }
                self.memory_used += size;
                log::debug!("📝 Undo: pushed group of {} elements", group.index_count());
                self.backward.push_back(group);
                self.log_memory_usage();
            }
        }
    }

    fn log_memory_usage(&self) {
        if self.config.max_undo_memory == 0 {
            return;
        }
        let percent = self.memory_used as f64 / self.config.max_undo_memory as f64 * 100.0;
        log::debug!(
            "Undo/redo: roughly {} of {} ({:.2}%) used",
            human_readable_size(self.memory_used),
            human_readable_size(self.config.max_undo_memory),
            percent
        );
    }

    // ========================================================================
    // Undo/Redo
    // ========================================================================

    /// Revert the newest group. Returns false if there was nothing to undo.
    pub fn undo(&mut self, annotations: &mut AnnotationManager) -> bool {
        // Close a gesture still in progress without dropping the redo stack.
        if self.state == GroupState::Recording {
            self.finish_group(Destination::Backward, false);
        }
        let Some(group) = self.backward.pop_back() else {
            return false;
        };
        if self.config.policy == RetentionPolicy::Memory {
            self.memory_used = self.memory_used.saturating_sub(group.memory_estimate());
        }
        log::debug!("⏪ Undo: restoring {} elements", group.index_count());
        self.replay(&group, ReplayDirection::Undo, annotations);
        true
    }

    /// Re-apply the newest undone group. Returns false if there was nothing to redo.
    pub fn redo(&mut self, annotations: &mut AnnotationManager) -> bool {
        if self.state == GroupState::Recording {
            self.finish_group(Destination::Backward, false);
        }
        let Some(group) = self.forward.pop_back() else {
            return false;
        };
        log::debug!("⏩ Redo: restoring {} elements", group.index_count());
        self.replay(&group, ReplayDirection::Redo, annotations);
        true
    }

    fn replay(&mut self, group: &UndoGroup, direction: ReplayDirection, annotations: &mut AnnotationManager) {
        self.state = GroupState::Replaying(direction);
        self.recorder.borrow_mut().recording = true;
        for selection in &group.selections {
            annotations.unsafe_annotate_with_label(&selection.label, &selection.indices);
        }
        let destination = match direction {
            ReplayDirection::Undo => Destination::Forward,
            ReplayDirection::Redo => Destination::Backward,
        };
        // The popped group changed the counts even if the replay recorded nothing.
        if !self.finish_group(destination, false) {
            self.notify_counts();
        }
    }

    pub fn undo_count(&self) -> usize {
        self.backward.len()
    }

    pub fn redo_count(&self) -> usize {
        self.forward.len()
    }

    pub fn has_undo(&self) -> bool {
        !self.backward.is_empty()
    }

    pub fn has_redo(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Estimated size of the undo stack, tracked while the memory policy is active.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    // ========================================================================
    // Retention
    // ========================================================================

    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    pub fn max_undo_static(&self) -> usize {
        self.config.max_undos
    }

    pub fn max_undo_memory(&self) -> usize {
        self.config.max_undo_memory
    }

    pub fn uses_static_undo_limit(&self) -> bool {
        self.config.policy == RetentionPolicy::Static
    }

    /// Switch between the static and memory policies, trimming to the new limit.
    pub fn set_use_static_undo_limit(&mut self, use_static: bool) {
        let policy = if use_static {
            RetentionPolicy::Static
        } else {
            RetentionPolicy::Memory
        };
        if self.config.policy == policy {
            return;
        }
        self.config.policy = policy;
        log::debug!("Undo retention policy set to {:?}", policy);
        match policy {
            RetentionPolicy::Static => self.set_max_undo_static(self.config.max_undos),
            RetentionPolicy::Memory => {
                self.memory_used = memory_estimate(&self.backward);
                self.set_max_undo_memory(self.config.max_undo_memory);
            }
        }
    }

    /// Set the group cap. Applied right away if the static policy is active.
    pub fn set_max_undo_static(&mut self, max_undos: usize) {
        self.config.max_undos = max_undos;
        if self.config.policy != RetentionPolicy::Static {
            return;
        }
        while self.backward.len() + self.forward.len() > max_undos && !self.backward.is_empty() {
            self.backward.pop_front();
        }
        while self.forward.len() > max_undos {
            self.forward.pop_front();
        }
        self.notify_counts();
    }

    /// Set the byte budget. Applied right away if the memory policy is active.
    pub fn set_max_undo_memory(&mut self, max_undo_memory: usize) {
        self.config.max_undo_memory = max_undo_memory;
        if self.config.policy != RetentionPolicy::Memory {
            return;
        }
        let mut redo_sum = memory_estimate(&self.forward);
        while self.memory_used + redo_sum > max_undo_memory {
            let Some(oldest) = self.backward.pop_front() else {
                break;
            };
            self.memory_used = self.memory_used.saturating_sub(oldest.memory_estimate());
        }
        while redo_sum > max_undo_memory {
            let Some(oldest) = self.forward.pop_front() else {
                break;
            };
            redo_sum = redo_sum.saturating_sub(oldest.memory_estimate());
        }
        self.notify_counts();
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop the open group's captured state. A hard reset also clears both stacks.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.memory_used = 0;
            self.backward.clear();
            self.forward.clear();
            log::debug!("🗑️ Undo history cleared");
            self.notify_counts();
        }
        self.state = GroupState::Idle;
        let mut recorder = self.recorder.borrow_mut();
        recorder.recording = false;
        recorder.clear_scratch();
    }

    /// Resume observing buffer writes.
    pub fn activate(&mut self) {
        self.recorder.borrow_mut().active = true;
    }

    /// Stop observing buffer writes. Groups opened meanwhile stay empty.
    pub fn deactivate(&mut self) {
        self.recorder.borrow_mut().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.recorder.borrow().active
    }

    /// Observe stack sizes. The observer is called immediately with the current counts.
    pub fn subscribe_counts<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&UndoRedoCount) + 'static,
    {
        self.count_observers
            .subscribe_with_replay(&self.counts(), observer)
    }

    pub fn counts(&self) -> UndoRedoCount {
        UndoRedoCount {
            undo: self.backward.len(),
            redo: self.forward.len(),
        }
    }

    fn notify_counts(&self) {
        self.count_observers.notify(&self.counts());
    }

    /// Stop observing the annotation buffer and drop all observers.
    pub fn dispose(&mut self) {
        self.subscription.unsubscribe();
        self.count_observers.clear();
    }
}

impl std::fmt::Debug for HybridUndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridUndoManager")
            .field("state", &self.state)
            .field("undo", &self.backward.len())
            .field("redo", &self.forward.len())
            .field("config", &self.config)
            .field("memory_used", &self.memory_used)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::LabelManager;
    use crate::constants::NEUTRAL_CLASS_CODE;
    use crate::model::{Color, Label};

    const N: ClassCode = NEUTRAL_CLASS_CODE;

    struct Fixture {
        annotations: AnnotationManager,
        undo: HybridUndoManager,
        labels: Vec<LabelRef>,
    }

    fn fixture(count: usize, config: UndoConfig) -> Fixture {
        let labels: Vec<LabelRef> = (0..3)
            .map(|i| Rc::new(Label::new(i, i, &format!("label{}", i), Color::default()).unwrap()))
            .collect();
        let label_manager = Rc::new(RefCell::new(LabelManager::new(labels.clone()).unwrap()));
        let annotations = AnnotationManager::new(count, label_manager);
        let undo = HybridUndoManager::new(&annotations, config);
        Fixture {
            annotations,
            undo,
            labels,
        }
    }

    impl Fixture {
        fn stroke(&mut self, label: usize, indices: &[u32]) {
            self.undo.start_group();
            self.annotations
                .annotate_with_label(&self.labels[label], indices);
            self.undo.end_group();
        }

        fn undo(&mut self) -> bool {
            self.undo.undo(&mut self.annotations)
        }

        fn redo(&mut self) -> bool {
            self.undo.redo(&mut self.annotations)
        }

        fn buffer(&self) -> Vec<ClassCode> {
            self.annotations.annotations().to_vec()
        }
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut f = fixture(4, UndoConfig::default());
        f.stroke(0, &[0, 1]);
        f.stroke(1, &[1, 2]);
        assert_eq!(f.buffer(), vec![0, 1, 1, N]);

        assert!(f.undo());
        assert_eq!(f.buffer(), vec![0, 0, N, N]);
        assert!(f.undo());
        assert_eq!(f.buffer(), vec![N, N, N, N]);
        assert!(!f.undo());

        assert!(f.redo());
        assert_eq!(f.buffer(), vec![0, 0, N, N]);
        assert!(f.redo());
        assert_eq!(f.buffer(), vec![0, 1, 1, N]);
        assert!(!f.redo());
    }

    #[test]
    fn test_repeated_strokes_in_one_group_collapse() {
        let mut f = fixture(3, UndoConfig::default());
        f.stroke(0, &[0]);
        f.undo.start_group();
        f.annotations.annotate_with_label(&f.labels[1], &[0, 1]);
        f.annotations.annotate_with_label(&f.labels[2], &[0, 1, 2]);
        f.undo.end_group();
        assert_eq!(f.undo.undo_count(), 2);

        f.undo();
        assert_eq!(f.buffer(), vec![0, N, N]);
    }

    #[test]
    fn test_empty_group_is_discarded() {
        let mut f = fixture(3, UndoConfig::default());
        f.undo.start_group();
        f.undo.end_group();
        assert_eq!(f.undo.undo_count(), 0);

        // All targets locked: the write happens but touches nothing.
        f.stroke(0, &[0]);
        f.labels[0].set_locked(true);
        f.stroke(1, &[0]);
        assert_eq!(f.undo.undo_count(), 1);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut f = fixture(3, UndoConfig::default());
        f.stroke(0, &[0]);
        f.stroke(1, &[1]);
        f.undo();
        assert!(f.undo.has_redo());
        f.stroke(2, &[2]);
        assert!(!f.undo.has_redo());
        assert_eq!(f.undo.undo_count(), 2);
    }

    #[test]
    fn test_undo_restores_locked_elements() {
        let mut f = fixture(2, UndoConfig::default());
        f.stroke(0, &[0]);
        f.labels[0].set_locked(true);
        f.undo();
        assert_eq!(f.buffer(), vec![N, N]);
    }

    #[test]
    fn test_undo_mid_gesture_keeps_redo_stack() {
        let mut f = fixture(3, UndoConfig::default());
        f.stroke(0, &[0]);
        f.stroke(1, &[1]);
        f.undo();
        assert_eq!(f.undo.redo_count(), 1);

        f.undo.start_group();
        f.annotations.annotate_with_label(&f.labels[2], &[2]);
        // Undo while the gesture is still open closes it first.
        f.undo();
        assert_eq!(f.buffer(), vec![0, N, N]);
        assert_eq!(f.undo.redo_count(), 2);
        assert!(!f.undo.is_grouping());
    }

    #[test]
    fn test_static_limit_evicts_oldest() {
        let mut f = fixture(5, UndoConfig::with_static_limit(2));
        f.stroke(0, &[0]);
        f.stroke(0, &[1]);
        f.stroke(0, &[2]);
        assert_eq!(f.undo.undo_count(), 2);
        f.undo();
        f.undo();
        assert!(!f.undo());
        // The first stroke can no longer be undone.
        assert_eq!(f.buffer(), vec![0, N, N, N, N]);
    }

    #[test]
    fn test_static_limit_zero_keeps_nothing() {
        let mut f = fixture(2, UndoConfig::with_static_limit(0));
        f.stroke(0, &[0]);
        assert_eq!(f.undo.undo_count(), 0);
    }

    #[test]
    fn test_memory_limit_evicts_oldest() {
        // Room for five recorded indices.
        let mut f = fixture(10, UndoConfig::with_memory_limit(50));
        f.stroke(0, &[0, 1, 2]);
        assert_eq!(f.undo.memory_used(), 30);
        f.stroke(0, &[3, 4]);
        assert_eq!(f.undo.memory_used(), 50);
        f.stroke(0, &[5]);
        assert_eq!(f.undo.undo_count(), 2);
        assert_eq!(f.undo.memory_used(), 30);
    }

    #[test]
    fn test_memory_limit_drops_oversized_group() {
        let mut f = fixture(10, UndoConfig::with_memory_limit(50));
        f.stroke(0, &[0]);
        f.stroke(0, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(f.undo.undo_count(), 1);
        assert_eq!(f.undo.memory_used(), 10);
    }

    #[test]
    fn test_memory_accounting_follows_undo_and_redo() {
        let mut f = fixture(10, UndoConfig::with_memory_limit(1000));
        f.stroke(0, &[0, 1]);
        f.stroke(1, &[2]);
        assert_eq!(f.undo.memory_used(), 30);
        f.undo();
        assert_eq!(f.undo.memory_used(), 20);
        f.redo();
        assert_eq!(f.undo.memory_used(), 30);
    }

    #[test]
    fn test_set_max_undo_static_trims_backward_first() {
        let mut f = fixture(5, UndoConfig::with_static_limit(10));
        for i in 0..4 {
            f.stroke(0, &[i]);
        }
        f.undo();
        f.undo();
        f.undo.set_max_undo_static(3);
        assert_eq!(f.undo.counts(), UndoRedoCount { undo: 1, redo: 2 });
        f.undo.set_max_undo_static(1);
        assert_eq!(f.undo.counts(), UndoRedoCount { undo: 0, redo: 1 });
    }

    #[test]
    fn test_switching_policy_recomputes_memory() {
        let mut f = fixture(10, UndoConfig::with_static_limit(10));
        f.stroke(0, &[0, 1, 2]);
        f.stroke(0, &[3]);
        assert_eq!(f.undo.memory_used(), 0);
        f.undo.set_use_static_undo_limit(false);
        assert_eq!(f.undo.memory_used(), 40);

        f.undo.set_max_undo_memory(15);
        assert_eq!(f.undo.undo_count(), 1);
        assert_eq!(f.undo.memory_used(), 10);
    }

    #[test]
    fn test_counts_are_broadcast() {
        let mut f = fixture(3, UndoConfig::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = f
            .undo
            .subscribe_counts(move |c| sink.borrow_mut().push((c.undo, c.redo)));
        f.stroke(0, &[0]);
        f.undo();
        f.undo.reset(true);
        assert_eq!(*seen.borrow(), vec![(0, 0), (1, 0), (0, 1), (0, 0)]);
    }

    #[test]
    fn test_soft_reset_drops_open_group() {
        let mut f = fixture(3, UndoConfig::default());
        f.stroke(0, &[0]);
        f.undo.start_group();
        f.annotations.annotate_with_label(&f.labels[1], &[1]);
        f.undo.reset(false);
        f.undo.end_group();
        assert_eq!(f.undo.undo_count(), 1);

        // The scratch state is clean for the next group.
        f.stroke(2, &[1]);
        f.undo();
        assert_eq!(f.buffer(), vec![0, 1, N]);
    }

    #[test]
    fn test_inactive_manager_records_nothing() {
        let mut f = fixture(3, UndoConfig::default());
        f.undo.deactivate();
        f.stroke(0, &[0]);
        assert_eq!(f.undo.undo_count(), 0);
        f.undo.activate();
        f.stroke(0, &[1]);
        assert_eq!(f.undo.undo_count(), 1);
    }

    #[test]
    fn test_dispose_stops_observing() {
        let mut f = fixture(3, UndoConfig::default());
        f.undo.dispose();
        f.stroke(0, &[0]);
        assert_eq!(f.undo.undo_count(), 0);
    }
}

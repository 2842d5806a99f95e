//! The dense per-element annotation buffer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{AnnotationError, LabelManager};
use crate::constants::NEUTRAL_CLASS_CODE;
use crate::model::{ClassCode, LabelRef, LabeledSelection};
use crate::observer::{Channel, Subscription};

/// A pending buffer change, broadcast before the buffer is written.
#[derive(Debug, Clone)]
pub struct AnnotationDiff {
    /// The label about to be written
    pub label: LabelRef,
    /// Indices about to be overwritten, after lock filtering
    pub indices: Vec<u32>,
    /// Class code each index holds before the write, parallel to `indices`
    pub previous: Vec<ClassCode>,
    /// Labels for the distinct previous class codes, where known
    pub previous_labels: Vec<LabelRef>,
}

/// Owns the annotation buffer and writes labels into it.
pub struct AnnotationManager {
    annotations: Vec<ClassCode>,
    label_manager: Rc<RefCell<LabelManager>>,
    observers: Channel<AnnotationDiff>,
}

impl AnnotationManager {
    /// Create a buffer of `element_count` neutral entries.
    pub fn new(element_count: usize, label_manager: Rc<RefCell<LabelManager>>) -> Self {
        log::debug!("Annotation buffer created for {} elements", element_count);
        Self {
            annotations: vec![NEUTRAL_CLASS_CODE; element_count],
            label_manager,
            observers: Channel::new(),
        }
    }

    pub fn label_manager(&self) -> &Rc<RefCell<LabelManager>> {
        &self.label_manager
    }

    pub fn element_count(&self) -> usize {
        self.annotations.len()
    }

    /// Read-only view of the buffer.
    pub fn annotations(&self) -> &[ClassCode] {
        &self.annotations
    }

    /// Observe buffer writes. There is no replay: a diff only exists while a write happens.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AnnotationDiff) + 'static,
    {
        self.observers.subscribe(observer)
    }

    /// Write the active label to `indices`, skipping elements whose label is locked.
    pub fn annotate(&mut self, indices: &[u32]) {
        let label = self.label_manager.borrow().active_label();
        self.annotate_with_label(&label, indices);
    }

    /// Write `label` to `indices`, skipping elements whose label is locked.
    ///
    /// Indices holding a class code unknown to the label set or lying
    /// outside the buffer are skipped as well.
    pub fn annotate_with_label(&mut self, label: &LabelRef, indices: &[u32]) {
        let editable: Vec<u32> = {
            let label_manager = self.label_manager.borrow();
            let label_map = label_manager.label_map();
            indices
                .iter()
                .copied()
                .filter(|&index| {
                    self.annotations
                        .get(index as usize)
                        .and_then(|class_code| label_map.get(class_code))
                        .is_some_and(|previous| !previous.is_locked())
                })
                .collect()
        };
        self.write(label, editable);
    }

    /// Write `label` to `indices` regardless of lock state.
    ///
    /// Reserved for undo and redo, which must restore any earlier state.
    pub fn unsafe_annotate_with_label(&mut self, label: &LabelRef, indices: &[u32]) {
        let in_range: Vec<u32> = indices
            .iter()
            .copied()
            .filter(|&index| (index as usize) < self.annotations.len())
            .collect();
        if in_range.len() != indices.len() {
            log::warn!(
                "Skipped {} out-of-range indices while annotating",
                indices.len() - in_range.len()
            );
        }
        self.write(label, in_range);
    }

    fn write(&mut self, label: &LabelRef, indices: Vec<u32>) {
        let previous: Vec<ClassCode> = indices
            .iter()
            .map(|&index| self.annotations[index as usize])
            .collect();
        let previous_labels = {
            let label_manager = self.label_manager.borrow();
            let mut seen: Vec<ClassCode> = Vec::new();
            let mut labels = Vec::new();
            for &class_code in &previous {
                if !seen.contains(&class_code) {
                    seen.push(class_code);
                    if let Some(known) = label_manager.label_by_class(class_code) {
                        labels.push(Rc::clone(known));
                    }
                }
            }
            labels
        };

        let diff = AnnotationDiff {
            label: Rc::clone(label),
            indices,
            previous,
            previous_labels,
        };
        // Observers must see the buffer before it changes.
        self.observers.notify(&diff);

        let class_code = label.class_code();
        for &index in &diff.indices {
            self.annotations[index as usize] = class_code;
        }
    }

    /// Reset the buffer to neutral, then apply `selections` through the lock-respecting path.
    pub fn load_annotations(&mut self, selections: &[LabeledSelection]) {
        self.annotations.fill(NEUTRAL_CLASS_CODE);
        for selection in selections {
            self.annotate_with_label(&selection.label, &selection.indices);
        }
        log::info!(
            "Loaded {} labeled selections into {} elements",
            selections.len(),
            self.annotations.len()
        );
    }

    /// Group the buffer by class code, indices ascending within each group.
    ///
    /// Fails if the buffer holds a class code the label set does not know.
    pub fn labeled_annotations_map(&self) -> Result<HashMap<ClassCode, LabeledSelection>, AnnotationError> {
        let label_manager = self.label_manager.borrow();
        let mut selections: HashMap<ClassCode, LabeledSelection> = HashMap::new();
        for (index, &class_code) in self.annotations.iter().enumerate() {
            match selections.get_mut(&class_code) {
                Some(selection) => selection.indices.push(index as u32),
                None => {
                    let label = label_manager
                        .label_by_class(class_code)
                        .ok_or(AnnotationError::UnknownClass(class_code))?;
                    selections.insert(class_code, LabeledSelection::new(Rc::clone(label), vec![index as u32]));
                }
            }
        }
        Ok(selections)
    }

    /// [`Self::labeled_annotations_map`] as a list sorted by class code.
    pub fn labeled_annotations(&self) -> Result<Vec<LabeledSelection>, AnnotationError> {
        let mut selections: Vec<LabeledSelection> = self.labeled_annotations_map()?.into_values().collect();
        selections.sort_by_key(|selection| selection.label.class_code());
        Ok(selections)
    }

    /// Reset the buffer to neutral and drop all observers.
    pub fn dispose(&mut self) {
        self.annotations.fill(NEUTRAL_CLASS_CODE);
        self.observers.clear();
    }
}

impl std::fmt::Debug for AnnotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationManager")
            .field("elements", &self.annotations.len())
            .field("observers", &self.observers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, Label, neutral_label};

    fn setup(count: usize) -> (AnnotationManager, Vec<LabelRef>) {
        let labels: Vec<LabelRef> = (0..3)
            .map(|i| Rc::new(Label::new(i, i, &format!("label{}", i), Color::new(0, 0, 0)).unwrap()))
            .collect();
        let label_manager = Rc::new(RefCell::new(LabelManager::new(labels.clone()).unwrap()));
        (AnnotationManager::new(count, label_manager), labels)
    }

    #[test]
    fn test_new_buffer_is_neutral() {
        let (manager, _) = setup(5);
        assert_eq!(manager.annotations(), &[NEUTRAL_CLASS_CODE; 5]);
    }

    #[test]
    fn test_annotate_uses_active_label() {
        let (mut manager, labels) = setup(5);
        manager.label_manager().borrow_mut().select_label(&labels[2]).unwrap();
        manager.annotate(&[1, 3]);
        assert_eq!(
            manager.annotations(),
            &[NEUTRAL_CLASS_CODE, 2, NEUTRAL_CLASS_CODE, 2, NEUTRAL_CLASS_CODE]
        );
    }

    #[test]
    fn test_locked_labels_are_skipped() {
        let (mut manager, labels) = setup(4);
        manager.annotate_with_label(&labels[1], &[0, 1]);
        labels[1].set_locked(true);
        manager.annotate_with_label(&labels[2], &[0, 1, 2]);
        assert_eq!(manager.annotations(), &[1, 1, 2, NEUTRAL_CLASS_CODE]);

        // Replay ignores locks.
        manager.unsafe_annotate_with_label(&labels[2], &[0]);
        assert_eq!(manager.annotations()[0], 2);
    }

    #[test]
    fn test_observers_see_pre_edit_state() {
        let (mut manager, labels) = setup(3);
        manager.annotate_with_label(&labels[0], &[0]);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = manager.subscribe(move |diff| {
            sink.borrow_mut()
                .push((diff.label.class_code(), diff.indices.clone(), diff.previous.clone()));
        });
        manager.annotate_with_label(&labels[1], &[0, 2]);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (1, vec![0, 2], vec![0, NEUTRAL_CLASS_CODE]));
    }

    #[test]
    fn test_diff_lists_previous_labels() {
        let (mut manager, labels) = setup(3);
        manager.annotate_with_label(&labels[0], &[0, 1]);
        let previous = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&previous);
        let _sub = manager.subscribe(move |diff| {
            *sink.borrow_mut() = diff.previous_labels.iter().map(|l| l.class_code()).collect();
        });
        manager.annotate_with_label(&labels[2], &[0, 1, 2]);
        assert_eq!(*previous.borrow(), vec![0, NEUTRAL_CLASS_CODE]);
    }

    #[test]
    fn test_out_of_range_indices_are_ignored() {
        let (mut manager, labels) = setup(2);
        manager.annotate_with_label(&labels[0], &[1, 7]);
        manager.unsafe_annotate_with_label(&labels[1], &[0, 9]);
        assert_eq!(manager.annotations(), &[1, 0]);
    }

    #[test]
    fn test_load_annotations_resets_first() {
        let (mut manager, labels) = setup(4);
        manager.annotate_with_label(&labels[0], &[0, 1, 2, 3]);
        manager.load_annotations(&[
            LabeledSelection::new(Rc::clone(&labels[1]), vec![1]),
            LabeledSelection::new(Rc::clone(&labels[2]), vec![3]),
        ]);
        assert_eq!(manager.annotations(), &[NEUTRAL_CLASS_CODE, 1, NEUTRAL_CLASS_CODE, 2]);
    }

    #[test]
    fn test_labeled_annotations_groups_by_label() {
        let (mut manager, labels) = setup(5);
        manager.annotate_with_label(&labels[1], &[1, 4]);
        manager.annotate_with_label(&labels[0], &[3]);

        let groups = manager.labeled_annotations().unwrap();
        let summary: Vec<(ClassCode, Vec<u32>)> = groups
            .iter()
            .map(|g| (g.label.class_code(), g.indices.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![(0, vec![3]), (1, vec![1, 4]), (NEUTRAL_CLASS_CODE, vec![0, 2])]
        );
        assert!(Rc::ptr_eq(&groups[2].label, &neutral_label()));

        let map = manager.labeled_annotations_map().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&1].indices, vec![1, 4]);
    }

    #[test]
    fn test_labeled_annotations_unknown_class() {
        let (mut manager, _) = setup(2);
        let stray = Rc::new(Label::new(99, 42, "stray", Color::default()).unwrap());
        manager.unsafe_annotate_with_label(&stray, &[1]);
        assert_eq!(
            manager.labeled_annotations().unwrap_err(),
            AnnotationError::UnknownClass(42)
        );
    }

    #[test]
    fn test_dispose_clears_buffer_and_observers() {
        let (mut manager, labels) = setup(2);
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let _sub = manager.subscribe(move |_| *counter.borrow_mut() += 1);
        manager.annotate_with_label(&labels[0], &[0]);
        manager.dispose();
        manager.annotate_with_label(&labels[0], &[1]);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(manager.annotations(), &[NEUTRAL_CLASS_CODE, 0]);
    }
}

//! Label set and active label management.

use std::collections::HashMap;
use std::rc::Rc;

use super::AnnotationError;
use crate::constants::MAX_CLASS_CODE;
use crate::model::{ClassCode, LabelRef, neutral_label};
use crate::observer::{Channel, Subscription};

/// Owns the label set and the active label.
///
/// Observers are notified synchronously while the manager is being mutated,
/// so they must not call back into it.
#[derive(Debug)]
pub struct LabelManager {
    labels: Vec<LabelRef>,
    /// Class code lookup including the neutral label
    label_map: HashMap<ClassCode, LabelRef>,
    active_label: LabelRef,
    active_label_observers: Channel<LabelRef>,
    labels_observers: Channel<Vec<LabelRef>>,
}

impl LabelManager {
    /// Create a manager over a non-empty label set. The first label becomes active.
    pub fn new(labels: Vec<LabelRef>) -> Result<Self, AnnotationError> {
        let label_map = Self::generate_label_map(&labels)?;
        let active_label = Rc::clone(&labels[0]);
        log::debug!("Label manager created with {} labels", labels.len());
        Ok(Self {
            labels,
            label_map,
            active_label,
            active_label_observers: Channel::new(),
            labels_observers: Channel::new(),
        })
    }

    fn generate_label_map(labels: &[LabelRef]) -> Result<HashMap<ClassCode, LabelRef>, AnnotationError> {
        if labels.is_empty() {
            return Err(AnnotationError::EmptyLabelSet);
        }
        let neutral = neutral_label();
        let mut label_map = HashMap::with_capacity(labels.len() + 1);
        for label in labels {
            if label.class_code() > MAX_CLASS_CODE {
                return Err(AnnotationError::ClassCodeOutOfBounds(label.class_code() as u32));
            }
            if label_map.insert(label.class_code(), Rc::clone(label)).is_some() {
                return Err(AnnotationError::DuplicateClassCode(label.class_code()));
            }
        }
        label_map.insert(neutral.class_code(), neutral);
        Ok(label_map)
    }

    /// Observe the active label. The observer is called immediately with the current one.
    pub fn subscribe_active_label<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&LabelRef) + 'static,
    {
        self.active_label_observers
            .subscribe_with_replay(&self.active_label, observer)
    }

    /// Observe the label set. The observer is called immediately with the current set.
    pub fn subscribe_labels<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Vec<LabelRef>) + 'static,
    {
        self.labels_observers.subscribe_with_replay(&self.labels, observer)
    }

    pub fn active_label(&self) -> LabelRef {
        Rc::clone(&self.active_label)
    }

    /// Make `label` the active label. Membership is checked by identity.
    pub fn select_label(&mut self, label: &LabelRef) -> Result<(), AnnotationError> {
        if !self.labels.iter().any(|l| Rc::ptr_eq(l, label)) {
            return Err(AnnotationError::label_not_found(&label.name));
        }
        self.active_label = Rc::clone(label);
        log::debug!("Selected label '{}' ({})", label.name, label.class_code());
        self.active_label_observers.notify(&self.active_label);
        Ok(())
    }

    /// Select the neutral label, erasing annotations.
    pub fn select_eraser(&mut self) {
        self.active_label = neutral_label();
        log::debug!("Selected eraser");
        self.active_label_observers.notify(&self.active_label);
    }

    pub fn is_eraser_selected(&self) -> bool {
        self.active_label.is_neutral()
    }

    pub fn labels(&self) -> &[LabelRef] {
        &self.labels
    }

    /// Class code lookup including the neutral label.
    pub fn label_map(&self) -> &HashMap<ClassCode, LabelRef> {
        &self.label_map
    }

    pub fn label_by_class(&self, class_code: ClassCode) -> Option<&LabelRef> {
        self.label_map.get(&class_code)
    }

    /// Lock or unlock the label with `class_code`. Locked labels are skipped by annotation.
    pub fn set_locked(&self, class_code: ClassCode, locked: bool) -> Result<(), AnnotationError> {
        let label = self.member_by_class(class_code)?;
        label.set_locked(locked);
        log::debug!("Label '{}' locked: {}", label.name, locked);
        Ok(())
    }

    /// Show or hide the label with `class_code`.
    pub fn set_visible(&self, class_code: ClassCode, visible: bool) -> Result<(), AnnotationError> {
        let label = self.member_by_class(class_code)?;
        label.set_visible(visible);
        log::debug!("Label '{}' visible: {}", label.name, visible);
        Ok(())
    }

    fn member_by_class(&self, class_code: ClassCode) -> Result<&LabelRef, AnnotationError> {
        self.labels
            .iter()
            .find(|label| label.class_code() == class_code)
            .ok_or_else(|| AnnotationError::label_not_found(format!("class {}", class_code)))
    }

    /// Replace the label set.
    ///
    /// With `selected_label` given it becomes the active label. Otherwise the
    /// active label is kept if the new set has a label with its class code,
    /// and falls back to the first new label if not.
    pub fn update_labels(
        &mut self,
        labels: Vec<LabelRef>,
        selected_label: Option<&LabelRef>,
    ) -> Result<(), AnnotationError> {
        if labels.is_empty() {
            return Err(AnnotationError::EmptyLabelSet);
        }
        if let Some(selected) = selected_label {
            if !labels.iter().any(|l| Rc::ptr_eq(l, selected)) {
                return Err(AnnotationError::label_not_found(&selected.name));
            }
        }
        let label_map = Self::generate_label_map(&labels)?;

        let mut active_label_changed = false;
        match selected_label {
            Some(selected) if !Rc::ptr_eq(selected, &self.active_label) => {
                self.active_label = Rc::clone(selected);
                active_label_changed = true;
            }
            Some(_) => {}
            None => {
                let active_class = self.active_label.class_code();
                if !labels.iter().any(|l| l.class_code() == active_class) {
                    self.active_label = Rc::clone(&labels[0]);
                    active_label_changed = true;
                }
            }
        }

        self.labels = labels;
        self.label_map = label_map;
        log::debug!("Label set updated to {} labels", self.labels.len());

        self.labels_observers.notify(&self.labels);
        if active_label_changed {
            self.active_label_observers.notify(&self.active_label);
        }
        Ok(())
    }

    /// Remove all observers.
    pub fn dispose(&mut self) {
        self.active_label_observers.clear();
        self.labels_observers.clear();
    }
}

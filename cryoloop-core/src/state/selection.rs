//! Selection lists
//!
//! An ordered list of (value, label) options backing a selection state.
//! Values need not be unique; lookup by value returns the first match.

use heapless::Vec;

/// Maximum options in one selection
pub const MAX_OPTIONS: usize = 8;

/// Option labels, in selection order
pub type OptionLabels = Vec<&'static str, MAX_OPTIONS>;

/// More options than a selection can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TooManyOptions {
    /// Options offered
    pub given: usize,
}

/// Ordered value/label options
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<T> {
    options: Vec<(T, &'static str), MAX_OPTIONS>,
}

impl<T: Copy + PartialEq> Selection<T> {
    /// Create a selection from options in display order
    ///
    /// Fails if there are more than [`MAX_OPTIONS`] options.
    pub fn new(options: &[(T, &'static str)]) -> Result<Self, TooManyOptions> {
        let options = Vec::from_slice(options).map_err(|_| {
            warn!("Selection of {} options, limit is {}", options.len(), MAX_OPTIONS);
            TooManyOptions {
                given: options.len(),
            }
        })?;
        Ok(Self { options })
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Check if there are no options
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Position of the first option carrying `value`
    pub fn index_of(&self, value: T) -> Option<usize> {
        self.options.iter().position(|(v, _)| *v == value)
    }

    /// Value of the option at `index`
    pub fn value_at(&self, index: usize) -> Option<T> {
        self.options.get(index).map(|(v, _)| *v)
    }

    /// Label of the option at `index`
    pub fn label_at(&self, index: usize) -> Option<&'static str> {
        self.options.get(index).map(|(_, l)| *l)
    }

    /// All labels in order
    pub fn labels(&self) -> OptionLabels {
        self.options.iter().map(|(_, l)| *l).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let sel = Selection::new(&[(10, "A"), (20, "B"), (30, "C")]).unwrap();
        assert_eq!(sel.len(), 3);
        assert_eq!(sel.index_of(20), Some(1));
        assert_eq!(sel.value_at(2), Some(30));
        assert_eq!(sel.label_at(0), Some("A"));
        assert_eq!(sel.index_of(99), None);
        assert_eq!(sel.value_at(3), None);
    }

    #[test]
    fn test_duplicate_values_return_first() {
        let sel = Selection::new(&[(1.0, "Low"), (2.0, "Mid"), (1.0, "Also low")]).unwrap();
        assert_eq!(sel.index_of(1.0), Some(0));
        assert_eq!(sel.label_at(2), Some("Also low"));
    }

    #[test]
    fn test_capacity() {
        let options = [(0i32, "x"); MAX_OPTIONS + 2];
        assert_eq!(
            Selection::new(&options),
            Err(TooManyOptions {
                given: MAX_OPTIONS + 2
            })
        );

        let sel = Selection::new(&options[..MAX_OPTIONS]).unwrap();
        assert_eq!(sel.len(), MAX_OPTIONS);
        assert_eq!(sel.labels().len(), MAX_OPTIONS);
    }
}

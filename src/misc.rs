//! Small helpers that don't belong anywhere else.

use hashbrown::HashMap;

pub trait Similarity {
    fn similarity(&self, other: &Self) -> f64;
}

impl<T: AsRef<str>> Similarity for T {
    fn similarity(&self, other: &Self) -> f64 {
        similarity(self.as_ref(), other.as_ref())
    }
}

/// Dice coefficient of the character bigrams of two strings, ignoring spaces.
/// Used to match audio device names loosely.
pub fn similarity(str1: &str, str2: &str) -> f64 {
    let a = str1.replace(' ', "").chars().collect::<Vec<_>>();
    let b = str2.replace(' ', "").chars().collect::<Vec<_>>();

    if a == b {
        return 1.0;
    }

    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut first_bigrams = HashMap::<(char, char), i32>::new();
    for i in a.windows(2) {
        *first_bigrams.entry((i[0], i[1])).or_insert(0) += 1;
    }

    let mut intersection_size = 0;
    for i in b.windows(2) {
        if let Some(count) = first_bigrams.get_mut(&(i[0], i[1])) {
            if *count > 0 {
                *count -= 1;
                intersection_size += 1;
            }
        }
    }

    (2.0 * intersection_size as f64) / (a.len() + b.len() - 2) as f64
}

#[cfg(test)]
mod test {
    use super::{similarity, Similarity};

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("speakers", "speakers"), 1.0);
        assert_eq!(similarity("a", "b"), 0.0);
        assert!("usb audio".similarity(&"usb audio device") > "hdmi".similarity(&"usb audio device"));
    }
}

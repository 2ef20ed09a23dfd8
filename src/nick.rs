//! Alternative nicknames for when the server rejects ours during registration.
use std::collections::VecDeque;

/// Produces nickname candidates, one at a time.
pub trait NickGenerator {
    /// Returns the next nickname to try, or `None` to give up.
    fn next_nick(&mut self) -> Option<String>;
}

/// Walks a fixed list of nicknames, giving up once it's exhausted.
#[derive(Debug, Clone, Default)]
pub struct AlternativeNicks {
    nicks: VecDeque<String>,
}

impl AlternativeNicks {
    /// Creates a generator that yields `nicks` in order.
    pub fn new<I, S>(nicks: I) -> AlternativeNicks
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AlternativeNicks {
            nicks: nicks.into_iter().map(Into::into).collect(),
        }
    }
}

impl NickGenerator for AlternativeNicks {
    fn next_nick(&mut self) -> Option<String> {
        self.nicks.pop_front()
    }
}

impl<F> NickGenerator for F
where
    F: FnMut() -> Option<String>,
{
    fn next_nick(&mut self) -> Option<String> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_yield_alternatives_in_order() {
        let mut nicks = AlternativeNicks::new(["zeta_", "zeta__"]);

        assert_eq!(nicks.next_nick().as_deref(), Some("zeta_"));
        assert_eq!(nicks.next_nick().as_deref(), Some("zeta__"));
        assert_eq!(nicks.next_nick(), None);
    }

    #[test]
    fn it_should_accept_closures() {
        let mut n = 0;
        let mut generator = move || {
            n += 1;
            (n < 3).then(|| format!("zeta{n}"))
        };

        assert_eq!(generator.next_nick().as_deref(), Some("zeta1"));
        assert_eq!(generator.next_nick().as_deref(), Some("zeta2"));
        assert_eq!(generator.next_nick(), None);
    }
}

//! Human-friendly names for created agents
//!
//! Created agents get an adjective-noun name with a short random suffix so
//! operators can tell deployed instances apart in the remote system's UI.

use rand::seq::IndexedRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "deft", "eager", "fable", "gentle", "hardy", "keen", "lucid",
    "mellow", "nimble", "quiet", "rapid", "solid", "tidy", "vivid", "witty",
];

const NOUNS: &[&str] = &[
    "aspen", "brook", "cedar", "delta", "ember", "fjord", "grove", "harbor", "inlet", "juniper",
    "knoll", "lagoon", "meadow", "orchid", "prairie", "ridge", "summit", "tundra",
];

/// Generate a name like `keen-harbor-4821`.
pub fn friendly_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).unwrap_or(&"plain");
    let noun = NOUNS.choose(&mut rng).unwrap_or(&"field");
    let suffix: u16 = rng.random_range(1000..10000);
    format!("{adjective}-{noun}-{suffix}")
}

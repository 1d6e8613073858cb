//! Human-readable identities for participants that did not pick one

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Brave", "Calm", "Clever", "Eager", "Fancy", "Gentle", "Happy", "Jolly", "Kind", "Lively",
    "Lucky", "Mighty", "Nimble", "Proud", "Quick", "Quiet", "Silly", "Sunny", "Witty", "Zany",
];

const ANIMALS: &[&str] = &[
    "Badger", "Beaver", "Bison", "Falcon", "Ferret", "Gecko", "Heron", "Koala", "Lemur", "Lynx",
    "Marmot", "Otter", "Panda", "Puffin", "Quokka", "Raven", "Tapir", "Walrus", "Wombat", "Yak",
];

/// Pick an identity such as `HappyOtter`
pub fn random_identity() -> String {
    random_identity_with(&mut rand::thread_rng())
}

/// Pick an identity using the given generator
pub fn random_identity_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Anonymous");
    let animal = ANIMALS.choose(rng).copied().unwrap_or("Participant");
    format!("{}{}", adjective, animal)
}

use cucumber::given;

use crate::cucumber::{payment_world::PaymentSystem, PaymentWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut PaymentWorld) {
    world.system = Some(PaymentSystem::new(false).await);
}

#[given("a fresh install that retries unfulfilled orders")]
async fn fresh_database_with_retries(world: &mut PaymentWorld) {
    world.system = Some(PaymentSystem::new(true).await);
}

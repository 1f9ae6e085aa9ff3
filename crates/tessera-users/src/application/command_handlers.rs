//! Command handlers for the Users context.
//!
//! Registration checks uniqueness, then saves the user, its outbox row and
//! publishes its domain events inside one unit of work. A failure at any
//! step rolls the whole write back.

use tessera_core::aggregate::AggregateRoot;
use tessera_core::clock::Clock;
use tessera_core::command::Command;
use tessera_core::error::DomainError;
use tessera_core::event::{DomainEvent, DomainEventBus};
use tessera_core::repository::Repository;
use tessera_core::unit_of_work::UnitOfWork;
use tessera_outbox::{OutboxEvent, OutboxWriter};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::User;
use crate::domain::commands::RegisterUser;
use crate::domain::events::UserCreated;
use crate::domain::repository::UserRepository;

/// Handles the `RegisterUser` command and returns the new user's id.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for malformed input,
/// `DomainError::AlreadyExists` if the email or username is taken, or
/// `DomainError::Infrastructure` if any write fails (nothing is persisted
/// in that case).
#[instrument(
    skip(command, clock, uow, users, outbox, bus),
    fields(correlation_id = %command.correlation_id)
)]
pub async fn handle_register_user<U, R, O>(
    command: &RegisterUser,
    clock: &dyn Clock,
    uow: &U,
    users: &R,
    outbox: &OutboxWriter<O>,
    bus: &dyn DomainEventBus,
) -> Result<Uuid, DomainError>
where
    U: UnitOfWork,
    R: Repository<User, Context = U::Context>,
    O: Repository<OutboxEvent, Context = U::Context>,
{
    let mut user = User::register(
        &command.email,
        &command.username,
        &command.first_name,
        &command.last_name,
        clock,
    )?;

    if users.exists_by_email(&user.email).await? {
        return Err(DomainError::already_exists("email", user.email));
    }
    if users.exists_by_username(&user.username).await? {
        return Err(DomainError::already_exists("username", user.username));
    }

    let events = user.pull_domain_events();
    let integration_events: Vec<UserCreated> = events.iter().map(UserCreated::from).collect();

    let user_id = uow
        .run(|ctx| async move {
            users.save(&user, Some(&ctx)).await?;
            for event in &integration_events {
                outbox.record(event, Some(&ctx)).await?;
            }
            let domain_events: Vec<&dyn DomainEvent> =
                events.iter().map(|e| e as &dyn DomainEvent).collect();
            bus.publish_all(&domain_events).await?;
            Ok::<_, DomainError>(user.id)
        })
        .await?;

    info!(command = command.command_type(), %user_id, "user registered");
    Ok(user_id)
}

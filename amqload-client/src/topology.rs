//! Declarative topology provisioning for a channel.
//!
//! Runs once per channel, not per message: given a channel and the
//! declared topology, it makes the broker match the configuration by
//! declaring (or delete-then-declaring) the queue and exchange, then
//! binding them.
//!
//! Which operations run, and in what order, is computed up front by
//! [`provisioning_plan`] from the settings alone; the broker calls are a
//! thin interpreter over that plan.
//!
//! The protocol has no atomic redefinition: when declared properties may
//! differ from what already exists, the only safe path is an explicit
//! delete followed by a fresh declare, accepting the narrow window where
//! the resource does not exist. Delete failures are advisory cleanup
//! noise and are swallowed; declare and bind failures propagate.

use crate::connection::ConnectionManager;
use amqload_core::{config::ExchangeType, Error, Result, TopologySettings};
use lapin::options::{
    ExchangeDeclareOptions, ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{Channel, ExchangeKind};
use tracing::{info, warn};

/// Log target for swallowed cleanup failures, so audits can filter them.
const CLEANUP_TARGET: &str = "amqload::cleanup";

/// One broker operation in the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    /// Best-effort queue delete ahead of a redeclare.
    DeleteQueue,
    /// Queue declare with the configured flags and arguments.
    DeclareQueue,
    /// Best-effort exchange delete ahead of a redeclare.
    DeleteExchange,
    /// Exchange declare with the configured kind and durability.
    DeclareExchange,
    /// Bind the queue to the exchange under the routing key.
    Bind,
}

/// Compute the ordered provisioning sequence for a topology.
///
/// Queue and exchange steps are gated on their declare flags, and a
/// delete appears only under the matching redeclare flag, always
/// directly before its declare. The bind step is present whenever a
/// queue is configured, independent of any declare flag.
#[must_use]
pub fn provisioning_plan(settings: &TopologySettings) -> Vec<ProvisionStep> {
    let mut plan = Vec::new();

    if settings.queue_configured() && settings.declare_queue {
        if settings.redeclare_queue {
            plan.push(ProvisionStep::DeleteQueue);
        }
        plan.push(ProvisionStep::DeclareQueue);
    }

    if settings.exchange_configured() && settings.declare_exchange {
        if settings.redeclare_exchange {
            plan.push(ProvisionStep::DeleteExchange);
        }
        plan.push(ProvisionStep::DeclareExchange);
    }

    if settings.queue_configured() {
        plan.push(ProvisionStep::Bind);
    }

    plan
}

/// Keep the current handle only while the check reports it open; a
/// closed handle is dropped so the caller rebuilds and re-provisions.
fn reusable<C>(current: Option<C>, is_open: impl Fn(&C) -> bool) -> Option<C> {
    current.filter(|handle| is_open(handle))
}

/// Provisions channels against a declared topology.
#[derive(Debug)]
pub struct TopologyManager<'a> {
    manager: &'a ConnectionManager,
    settings: &'a TopologySettings,
}

impl<'a> TopologyManager<'a> {
    /// Pair a connection manager with the topology to ensure.
    #[must_use]
    pub fn new(manager: &'a ConnectionManager, settings: &'a TopologySettings) -> Self {
        Self { manager, settings }
    }

    /// Hand back a usable, provisioned channel.
    ///
    /// An existing channel that still reports open is returned untouched:
    /// provisioning happens at most once per channel instance. A channel
    /// that was observed closed is discarded, and a fresh one is opened
    /// and provisioned in its place.
    ///
    /// # Errors
    /// Propagates channel-open failures, [`Error::TopologyDeclare`] for
    /// rejected declares, and [`Error::Bind`] for rejected binds.
    pub async fn ensure_channel(&self, current: Option<Channel>) -> Result<Channel> {
        let current = reusable(current, |channel: &Channel| {
            let open = channel.status().connected();
            if !open {
                warn!(channel = channel.id(), "channel closed unexpectedly, reopening");
            }
            open
        });
        if let Some(channel) = current {
            return Ok(channel);
        }

        let channel = self.manager.create_channel().await?;
        self.provision(&channel).await?;
        Ok(channel)
    }

    async fn provision(&self, channel: &Channel) -> Result<()> {
        for step in provisioning_plan(self.settings) {
            self.apply(channel, step).await?;
        }

        info!(
            queue = %self.settings.queue,
            exchange = %self.settings.exchange,
            routing_key = %self.settings.routing_key,
            "topology ready"
        );
        Ok(())
    }

    async fn apply(&self, channel: &Channel, step: ProvisionStep) -> Result<()> {
        match step {
            ProvisionStep::DeleteQueue => {
                self.delete_queue().await;
                Ok(())
            }
            ProvisionStep::DeclareQueue => {
                let options = QueueDeclareOptions {
                    durable: self.settings.queue_durable,
                    exclusive: self.settings.queue_exclusive,
                    auto_delete: self.settings.queue_auto_delete,
                    ..QueueDeclareOptions::default()
                };
                channel
                    .queue_declare(&self.settings.queue, options, queue_arguments(self.settings))
                    .await
                    .map_err(|e| {
                        Error::TopologyDeclare(format!("queue `{}`: {e}", self.settings.queue))
                    })?;
                Ok(())
            }
            ProvisionStep::DeleteExchange => {
                self.delete_exchange().await;
                Ok(())
            }
            ProvisionStep::DeclareExchange => {
                let options = ExchangeDeclareOptions {
                    durable: self.settings.exchange_durable,
                    ..ExchangeDeclareOptions::default()
                };
                channel
                    .exchange_declare(
                        &self.settings.exchange,
                        exchange_kind(self.settings.exchange_type),
                        options,
                        FieldTable::default(),
                    )
                    .await
                    .map_err(|e| {
                        Error::TopologyDeclare(format!(
                            "exchange `{}`: {e}",
                            self.settings.exchange
                        ))
                    })?;
                Ok(())
            }
            ProvisionStep::Bind => {
                channel
                    .queue_bind(
                        &self.settings.queue,
                        &self.settings.exchange,
                        &self.settings.routing_key,
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await
                    .map_err(|e| {
                        Error::Bind(format!(
                            "queue `{}` to exchange `{}`: {e}",
                            self.settings.queue, self.settings.exchange
                        ))
                    })?;
                Ok(())
            }
        }
    }

    /// Best-effort queue delete ahead of a redeclare. Runs on its own
    /// short-lived channel: a failed delete closes the channel it ran on.
    async fn delete_queue(&self) {
        let channel = match self.manager.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(target: CLEANUP_TARGET, error = %e, "could not open cleanup channel");
                return;
            }
        };

        info!(queue = %self.settings.queue, "deleting queue before redeclare");
        if let Err(e) =
            channel.queue_delete(&self.settings.queue, QueueDeleteOptions::default()).await
        {
            warn!(
                target: CLEANUP_TARGET,
                queue = %self.settings.queue,
                error = %e,
                "queue delete failed, proceeding with declare"
            );
        }
        close_cleanup_channel(channel).await;
    }

    /// Best-effort exchange delete ahead of a redeclare.
    async fn delete_exchange(&self) {
        let channel = match self.manager.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(target: CLEANUP_TARGET, error = %e, "could not open cleanup channel");
                return;
            }
        };

        info!(exchange = %self.settings.exchange, "deleting exchange before redeclare");
        if let Err(e) = channel
            .exchange_delete(&self.settings.exchange, ExchangeDeleteOptions::default())
            .await
        {
            warn!(
                target: CLEANUP_TARGET,
                exchange = %self.settings.exchange,
                error = %e,
                "exchange delete failed, proceeding with declare"
            );
        }
        close_cleanup_channel(channel).await;
    }
}

async fn close_cleanup_channel(channel: Channel) {
    if channel.status().connected() {
        if let Err(e) = channel.close(200, "redeclare cleanup done").await {
            warn!(target: CLEANUP_TARGET, error = %e, "error closing cleanup channel");
        }
    }
}

/// Map the configured exchange type onto the protocol kind.
#[must_use]
pub fn exchange_kind(exchange_type: ExchangeType) -> ExchangeKind {
    match exchange_type {
        ExchangeType::Direct => ExchangeKind::Direct,
        ExchangeType::Topic => ExchangeKind::Topic,
        ExchangeType::Headers => ExchangeKind::Headers,
        ExchangeType::Fanout => ExchangeKind::Fanout,
    }
}

/// Build the optional queue arguments table.
///
/// `x-message-ttl` and `x-expires` are present only when their source
/// values parse to an integer of at least 1; unset or non-positive values
/// are omitted entirely, never zeroed.
#[must_use]
pub fn queue_arguments(settings: &TopologySettings) -> FieldTable {
    let mut arguments = FieldTable::default();
    if let Some(ttl) = settings.message_ttl_ms() {
        arguments.insert(ShortString::from("x-message-ttl"), AMQPValue::LongLongInt(i64::from(ttl)));
    }
    if let Some(expires) = settings.queue_expires_ms() {
        arguments.insert(ShortString::from("x-expires"), AMQPValue::LongLongInt(i64::from(expires)));
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> TopologySettings {
        TopologySettings::default()
    }

    #[test]
    fn plan_is_empty_when_nothing_is_configured() {
        assert!(provisioning_plan(&topology()).is_empty());
    }

    #[test]
    fn redeclare_delete_directly_precedes_the_declare() {
        let mut settings = topology();
        settings.queue = "load.q".into();
        settings.declare_queue = true;
        settings.redeclare_queue = true;
        settings.exchange = "load.x".into();
        settings.declare_exchange = true;
        settings.redeclare_exchange = true;

        assert_eq!(
            provisioning_plan(&settings),
            vec![
                ProvisionStep::DeleteQueue,
                ProvisionStep::DeclareQueue,
                ProvisionStep::DeleteExchange,
                ProvisionStep::DeclareExchange,
                ProvisionStep::Bind,
            ]
        );
    }

    #[test]
    fn redeclare_flag_alone_does_not_delete() {
        let mut settings = topology();
        settings.queue = "load.q".into();
        settings.redeclare_queue = true;
        settings.exchange = "load.x".into();
        settings.redeclare_exchange = true;

        assert_eq!(provisioning_plan(&settings), vec![ProvisionStep::Bind]);
    }

    #[test]
    fn bind_runs_even_when_no_declare_flag_is_set() {
        let mut settings = topology();
        settings.queue = "load.q".into();
        settings.exchange = "load.x".into();

        assert_eq!(provisioning_plan(&settings), vec![ProvisionStep::Bind]);
    }

    #[test]
    fn no_bind_without_a_queue() {
        let mut settings = topology();
        settings.exchange = "load.x".into();
        settings.declare_exchange = true;

        assert_eq!(provisioning_plan(&settings), vec![ProvisionStep::DeclareExchange]);
    }

    #[test]
    fn blank_names_gate_their_steps_off() {
        let mut settings = topology();
        settings.queue = "   ".into();
        settings.declare_queue = true;
        settings.exchange = "\t".into();
        settings.declare_exchange = true;

        assert!(provisioning_plan(&settings).is_empty());
    }

    #[test]
    fn queue_only_redeclare_scenario() {
        let mut settings = topology();
        settings.queue = "load.q".into();
        settings.declare_queue = true;
        settings.redeclare_queue = true;

        assert_eq!(
            provisioning_plan(&settings),
            vec![ProvisionStep::DeleteQueue, ProvisionStep::DeclareQueue, ProvisionStep::Bind]
        );
    }

    #[test]
    fn closed_handle_is_discarded_for_rebuild() {
        assert_eq!(reusable(Some(7), |_| false), None);
        assert_eq!(reusable(Some(7), |_| true), Some(7));
        assert_eq!(reusable(None::<i32>, |_| true), None);
    }

    #[test]
    fn arguments_empty_when_nothing_configured() {
        let settings = topology();
        assert!(queue_arguments(&settings).inner().is_empty());
    }

    #[test]
    fn ttl_only_scenario() {
        let mut settings = topology();
        settings.message_ttl = "500".into();
        settings.queue_expires = String::new();

        let arguments = queue_arguments(&settings);
        let inner = arguments.inner();
        assert_eq!(
            inner.get(&ShortString::from("x-message-ttl")),
            Some(&AMQPValue::LongLongInt(500))
        );
        assert!(!inner.contains_key(&ShortString::from("x-expires")));
    }

    #[test]
    fn both_arguments_when_both_positive() {
        let mut settings = topology();
        settings.message_ttl = "1000".into();
        settings.queue_expires = "60000".into();

        let arguments = queue_arguments(&settings);
        let inner = arguments.inner();
        assert_eq!(inner.len(), 2);
        assert_eq!(
            inner.get(&ShortString::from("x-expires")),
            Some(&AMQPValue::LongLongInt(60_000))
        );
    }

    #[test]
    fn non_positive_values_are_omitted_not_zeroed() {
        let mut settings = topology();
        settings.message_ttl = "0".into();
        settings.queue_expires = "-1".into();
        assert!(queue_arguments(&settings).inner().is_empty());
    }

    #[test]
    fn exchange_kinds_cover_all_types() {
        assert_eq!(exchange_kind(ExchangeType::Direct), ExchangeKind::Direct);
        assert_eq!(exchange_kind(ExchangeType::Topic), ExchangeKind::Topic);
        assert_eq!(exchange_kind(ExchangeType::Headers), ExchangeKind::Headers);
        assert_eq!(exchange_kind(ExchangeType::Fanout), ExchangeKind::Fanout);
    }
}

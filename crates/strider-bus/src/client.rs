use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tracing::{debug, error, trace};

use crate::error::BusResult;
use crate::message::{TimeLimitResponse, UpdateMessage};
use crate::names;
use crate::publisher::JobUpdatePublisher;

/// AMQP client bound to the jobs exchange.
///
/// One instance lives for the whole invocation. Consumers are created on the
/// same channel; their queues auto-delete when the process goes away.
pub struct AmqpBus {
    _connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpBus {
    /// Connect to the broker and declare the jobs exchange.
    pub async fn connect(uri: &str, exchange: &str, exchange_type: &str) -> BusResult<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                exchange,
                exchange_kind(exchange_type),
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        debug!(exchange, "connected to amqp broker");
        Ok(Self {
            _connection: connection,
            channel,
            exchange: exchange.to_string(),
        })
    }

    async fn subscribe(&self, queue: &str, routing_key: &str) -> BusResult<Consumer> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_bind(
                queue,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        let consumer = self
            .channel
            .basic_consume(
                queue,
                queue,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        debug!(queue, routing_key, "subscribed");
        Ok(consumer)
    }

    /// Consumer for stop requests aimed at this invocation.
    pub async fn subscribe_stop_requests(&self, invocation_id: &str) -> BusResult<Consumer> {
        self.subscribe(
            &names::stop_queue_name(invocation_id),
            &names::stop_request_key(invocation_id),
        )
        .await
    }

    /// Consumer for time-limit-delta requests.
    pub async fn subscribe_time_limit_deltas(&self, invocation_id: &str) -> BusResult<Consumer> {
        self.subscribe(
            &names::time_limit_delta_queue_name(invocation_id),
            &names::time_limit_delta_key(invocation_id),
        )
        .await
    }

    /// Consumer for time-limit queries.
    pub async fn subscribe_time_limit_requests(&self, invocation_id: &str) -> BusResult<Consumer> {
        self.subscribe(
            &names::time_limit_request_queue_name(invocation_id),
            &names::time_limit_request_key(invocation_id),
        )
        .await
    }

    /// Consumer for the replies this runner publishes itself.
    ///
    /// Nothing here needs the messages; consuming the queue makes the broker
    /// delete it when the runner exits.
    pub async fn subscribe_time_limit_responses(&self, invocation_id: &str) -> BusResult<Consumer> {
        self.subscribe(
            &names::time_limit_response_queue_name(invocation_id),
            &names::time_limit_response_key(invocation_id),
        )
        .await
    }

    /// Publish the reply to a time-limit query.
    pub async fn send_time_limit_response(
        &self,
        invocation_id: &str,
        milliseconds_remaining: i64,
    ) -> BusResult<()> {
        let payload = serde_json::to_vec(&TimeLimitResponse {
            milliseconds_remaining,
        })?;
        self.channel
            .basic_publish(
                &self.exchange,
                &names::time_limit_response_key(invocation_id),
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await?
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobUpdatePublisher for AmqpBus {
    async fn publish_job_update(&self, update: UpdateMessage) -> BusResult<()> {
        let payload = serde_json::to_vec(&update)?;
        self.channel
            .basic_publish(
                &self.exchange,
                names::UPDATES_KEY,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await?
            .await?;
        trace!(state = ?update.state, "published job update");
        Ok(())
    }
}

/// Ack every delivery on `consumer` and hand its payload to `handler`.
///
/// Runs until the consumer is cancelled by the broker or the channel closes,
/// which happens when the process exits.
pub async fn listen<F>(mut consumer: Consumer, mut handler: F)
where
    F: FnMut(Vec<u8>) + Send,
{
    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!("failed to ack delivery: {e}");
                }
                handler(delivery.data);
            }
            Err(e) => error!("consumer error: {e}"),
        }
    }
}

fn exchange_kind(exchange_type: &str) -> ExchangeKind {
    match exchange_type {
        "topic" => ExchangeKind::Topic,
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "headers" => ExchangeKind::Headers,
        other => ExchangeKind::Custom(other.to_string()),
    }
}

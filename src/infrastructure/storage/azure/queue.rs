//! Queue service client

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use tracing::info;

use super::client::StorageHttpClient;
use super::xml;
use crate::domain::storage::{MessageQueue, QueueMessage};
use crate::domain::DomainError;

/// Largest page the service hands out per receive call
pub const MAX_MESSAGES_PER_RECEIVE: usize = 32;

const APPROXIMATE_COUNT_HEADER: &str = "x-ms-approximate-messages-count";

/// `MessageQueue` over one storage queue
#[derive(Debug, Clone)]
pub struct AzureMessageQueue {
    client: StorageHttpClient,
    queue: String,
    visibility_timeout: Duration,
}

impl AzureMessageQueue {
    pub fn new(client: StorageHttpClient, queue: impl Into<String>) -> Self {
        Self {
            client,
            queue: queue.into(),
            visibility_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl MessageQueue for AzureMessageQueue {
    async fn send(&self, content: &str) -> Result<(), DomainError> {
        let url = self.client.url(&[&self.queue, "messages"], &[]);
        let body = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            xml::escape(content)
        );

        self.client
            .send(
                Method::POST,
                url,
                &[("content-type", "application/xml".to_string())],
                Bytes::from(body),
            )
            .await?;

        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>, DomainError> {
        if max_messages == 0 {
            return Ok(Vec::new());
        }

        let count = max_messages.min(MAX_MESSAGES_PER_RECEIVE).to_string();
        let visibility = self.visibility_timeout.as_secs().max(1).to_string();
        let url = self.client.url(
            &[&self.queue, "messages"],
            &[("numofmessages", &count), ("visibilitytimeout", &visibility)],
        );

        let body = self
            .client
            .send(Method::GET, url, &[], Bytes::new())
            .await?
            .text()
            .await
            .map_err(|e| DomainError::transient_io(format!("Failed to read messages: {}", e)))?;

        Ok(xml::parse_messages(&body)
            .into_iter()
            .map(|m| QueueMessage {
                id: m.id,
                pop_receipt: m.pop_receipt,
                content: m.text,
                dequeue_count: m.dequeue_count,
            })
            .collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), DomainError> {
        let url = self.client.url(
            &[&self.queue, "messages", &message.id],
            &[("popreceipt", &message.pop_receipt)],
        );

        self.client
            .send(Method::DELETE, url, &[], Bytes::new())
            .await
            .map_err(|e| match e {
                DomainError::MissingResource { .. } => {
                    DomainError::missing_resource(format!("message {}", message.id))
                }
                other => other,
            })?;

        Ok(())
    }

    async fn approximate_len(&self) -> Result<usize, DomainError> {
        let url = self.client.url(&[&self.queue], &[("comp", "metadata")]);
        let response = self.client.send(Method::GET, url, &[], Bytes::new()).await?;

        response
            .headers()
            .get(APPROXIMATE_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                DomainError::transient_io(format!(
                    "Queue '{}' metadata has no {} header",
                    self.queue, APPROXIMATE_COUNT_HEADER
                ))
            })
    }

    async fn ensure_queue(&self) -> Result<bool, DomainError> {
        let url = self.client.url(&[&self.queue], &[]);

        match self.client.send(Method::PUT, url, &[], Bytes::new()).await {
            Ok(response) => {
                let created = response.status() == StatusCode::CREATED;
                if created {
                    info!(queue = %self.queue, "Created queue");
                }
                Ok(created)
            }
            Err(DomainError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::infrastructure::storage::azure::credential::SharedKeyCredential;

    async fn queue(server: &MockServer) -> AzureMessageQueue {
        let credential = SharedKeyCredential::new("devstoreaccount1", "a2V5").unwrap();
        let client =
            StorageHttpClient::new(&format!("{}/devstoreaccount1", server.uri()), Arc::new(credential))
                .unwrap();
        AzureMessageQueue::new(client, "samples")
    }

    #[tokio::test]
    async fn test_send_escapes_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devstoreaccount1/samples/messages"))
            .and(body_string(
                "<QueueMessage><MessageText>{&quot;image_name&quot;:&quot;a.png&quot;}</MessageText></QueueMessage>",
            ))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let queue = queue(&server).await;
        queue.send(r#"{"image_name":"a.png"}"#).await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_caps_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devstoreaccount1/samples/messages"))
            .and(query_param("numofmessages", "32"))
            .and(query_param("visibilitytimeout", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<QueueMessagesList><QueueMessage><MessageId>m1</MessageId>\
                 <PopReceipt>r1</PopReceipt><DequeueCount>1</DequeueCount>\
                 <MessageText>hello</MessageText></QueueMessage></QueueMessagesList>",
            ))
            .mount(&server)
            .await;

        let queue = queue(&server).await;
        let messages = queue.receive(100).await.unwrap();

        assert_eq!(
            messages,
            vec![QueueMessage {
                id: "m1".to_string(),
                pop_receipt: "r1".to_string(),
                content: "hello".to_string(),
                dequeue_count: 1,
            }]
        );
        assert!(queue.receive(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_passes_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/devstoreaccount1/samples/messages/m1"))
            .and(query_param("popreceipt", "r1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let queue = queue(&server).await;
        let message = QueueMessage {
            id: "m1".to_string(),
            pop_receipt: "r1".to_string(),
            content: String::new(),
            dequeue_count: 1,
        };
        queue.delete(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_approximate_len_reads_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devstoreaccount1/samples"))
            .and(query_param("comp", "metadata"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("x-ms-approximate-messages-count", "7"),
            )
            .mount(&server)
            .await;

        let queue = queue(&server).await;
        assert_eq!(queue.approximate_len().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_ensure_queue_reports_creation() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/devstoreaccount1/samples"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let queue = queue(&server).await;
        assert!(queue.ensure_queue().await.unwrap());
    }
}

use actix_web::web::Bytes;
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::FragmentStream;

/// Fragments buffered between the model and a slow client.
pub const CHANNEL_CAPACITY: usize = 16;

pub type ResponseStream = ReceiverStream<Result<Bytes, AppError>>;

/// Moves model fragments into the response body as they arrive.
///
/// A spawned task drains `fragments` into a bounded channel; the returned
/// receiver is the response body. The task stops when the client goes
/// away, when the model finishes, on a model error, or at `deadline`, which
/// the caller fixes when the request arrives.
/// Errors are sent down the channel, which aborts the response.
pub fn relay(fragments: FragmentStream, deadline: Instant, request_id: Uuid) -> ResponseStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    actix_web::rt::spawn(async move {
        match timeout_at(deadline, forward(fragments, &tx)).await {
            Ok(Ok(count)) => info!("Chat {} finished after {} fragments", request_id, count),
            Ok(Err(e)) => {
                error!("Chat {} failed mid-stream: {}", request_id, e);
                let _ = tx.send(Err(e)).await;
            }
            Err(_) => {
                warn!("Chat {} ran past its deadline, aborting", request_id);
                let _ = tx.send(Err(AppError::Timeout)).await;
            }
        }
    });

    ReceiverStream::new(rx)
}

async fn forward(
    mut fragments: FragmentStream,
    tx: &mpsc::Sender<Result<Bytes, AppError>>,
) -> Result<usize, AppError> {
    let mut count = 0;
    while let Some(fragment) = fragments.next().await {
        let text = fragment?;
        if tx.send(Ok(Bytes::from(text))).await.is_err() {
            debug!("Client went away, dropping the rest of the reply");
            break;
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    fn in_secs(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    fn fragments_of(items: Vec<Result<String, crate::model::ModelError>>) -> FragmentStream {
        stream::iter(items).boxed()
    }

    #[actix_web::test]
    async fn fragments_arrive_in_order() {
        let input = fragments_of(vec![Ok("Push".into()), Ok("-ups ".into()), Ok("daily.".into())]);
        let out: Vec<Bytes> = relay(input, in_secs(5), Uuid::new_v4())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec![Bytes::from("Push"), Bytes::from("-ups "), Bytes::from("daily.")]);
    }

    #[actix_web::test]
    async fn model_error_is_forwarded_after_delivered_fragments() {
        let input = fragments_of(vec![
            Ok("Warm up".into()),
            Err(crate::model::ModelError::Upstream("boom".into())),
            Ok("unreachable".into()),
        ]);
        let out: Vec<_> = relay(input, in_secs(5), Uuid::new_v4()).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), &Bytes::from("Warm up"));
        assert!(matches!(out[1], Err(AppError::Upstream(_))));
    }

    #[actix_web::test]
    async fn stalled_model_hits_deadline() {
        let stalled = stream::once(async { Ok::<_, crate::model::ModelError>("first".to_string()) })
            .chain(stream::pending())
            .boxed();
        let out: Vec<_> = relay(stalled, Instant::now() + Duration::from_millis(50), Uuid::new_v4()).collect().await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(AppError::Timeout)));
    }

    #[actix_web::test]
    async fn deadline_already_spent_upstream_leaves_no_time_to_stream() {
        let slow = stream::pending::<Result<String, crate::model::ModelError>>().boxed();
        let out: Vec<_> = relay(slow, Instant::now(), Uuid::new_v4()).collect().await;
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(AppError::Timeout)));
    }
}

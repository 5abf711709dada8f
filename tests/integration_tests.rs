use async_trait::async_trait;
use chrono::Utc;
use gtfs_rt_monitor::config::FeedJob;
use gtfs_rt_monitor::error::PipelineError;
use gtfs_rt_monitor::fetch::BasicClient;
use gtfs_rt_monitor::gtfs_rt::{
    FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate, VehiclePosition,
};
use gtfs_rt_monitor::pipeline::FeedPipeline;
use gtfs_rt_monitor::point::MetricPoint;
use gtfs_rt_monitor::scheduler::TickRunner;
use gtfs_rt_monitor::writer::PointWriter;
use prost::Message;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingWriter {
    points: Mutex<Vec<MetricPoint>>,
    fail: bool,
}

#[async_trait]
impl PointWriter for RecordingWriter {
    async fn write(&self, point: &MetricPoint) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::Write("connection refused".into()));
        }
        self.points.lock().unwrap().push(point.clone());
        Ok(())
    }
}

impl RecordingWriter {
    fn single(&self) -> MetricPoint {
        let points = self.points.lock().unwrap();
        assert_eq!(points.len(), 1);
        points[0].clone()
    }
}

async fn serve(status: u16, body: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.pb"))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
        .mount(&server)
        .await;
    server
}

fn job_for(server: &MockServer, interval: Duration) -> FeedJob {
    FeedJob {
        agency_id: "mbta".to_string(),
        feed_id: "trip_updates".to_string(),
        feed_url: format!("{}/feed.pb", server.uri()),
        poll_interval: interval,
    }
}

fn pipeline(writer: Arc<RecordingWriter>) -> FeedPipeline<BasicClient, RecordingWriter> {
    FeedPipeline::new(Arc::new(BasicClient::new().unwrap()), writer)
}

fn feed(header_ts: Option<u64>, entity: Vec<FeedEntity>) -> Vec<u8> {
    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: header_ts,
            incrementality: None,
            feed_version: None,
        },
        entity,
    }
    .encode_to_vec()
}

fn assert_no_entity_fields(point: &MetricPoint) {
    let f = &point.fields;
    assert_eq!(f.entity_count, None);
    assert_eq!(f.trip_update_count, None);
    assert_eq!(f.vehicle_position_count, None);
    assert_eq!(f.alert_count, None);
    assert_eq!(f.header_ts_age_ms, None);
    assert_eq!(f.entity_timestamp_ages_min_ms, None);
    assert_eq!(f.entity_timestamp_ages_max_ms, None);
    assert_eq!(f.entity_timestamp_ages_avg_ms, None);
}

#[tokio::test]
async fn test_full_pipeline_success() {
    let now_secs = Utc::now().timestamp() as u64;
    let body = feed(
        Some(now_secs - 5),
        vec![
            FeedEntity {
                id: "t1".to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("trip-1".to_string()),
                        ..Default::default()
                    },
                    timestamp: Some(now_secs - 60),
                    ..Default::default()
                }),
                ..Default::default()
            },
            FeedEntity {
                id: "v1".to_string(),
                vehicle: Some(VehiclePosition::default()),
                ..Default::default()
            },
        ],
    );
    let server = serve(200, body.clone()).await;
    let writer = Arc::new(RecordingWriter::default());

    pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_secs(30)))
        .await
        .unwrap();

    let point = writer.single();
    let f = &point.fields;
    assert_eq!(point.tags.agency_id, "mbta");
    assert_eq!(point.tags.feed_id, "trip_updates");
    assert_eq!(f.status_code, Some(200));
    assert!(f.response_time_ms.is_some());
    assert_eq!(f.response_size_bytes, Some(body.len() as i64));
    assert_eq!(f.entity_count, Some(2));
    assert_eq!(f.trip_update_count, Some(1));
    assert_eq!(f.vehicle_position_count, Some(1));
    assert_eq!(f.alert_count, Some(0));
    assert!(f.header_ts_age_ms.is_some());

    let min = f.entity_timestamp_ages_min_ms.unwrap();
    assert_eq!(f.entity_timestamp_ages_max_ms, Some(min));
    assert_eq!(f.entity_timestamp_ages_avg_ms, Some(min));
    // the single trip update is a minute old, measured from tick start
    assert!((60_000.0..62_000.0).contains(&min));
    assert_eq!(f.error, None);
}

#[tokio::test]
async fn test_http_error_keeps_transport_fields() {
    let server = serve(404, b"Not Found".to_vec()).await;
    let writer = Arc::new(RecordingWriter::default());

    pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_secs(30)))
        .await
        .unwrap();

    let point = writer.single();
    assert_eq!(point.fields.status_code, Some(404));
    assert!(point.fields.response_time_ms.is_some());
    assert_eq!(point.fields.response_size_bytes, Some(9));
    assert!(point.fields.error.as_deref().unwrap().contains("404"));
    assert_no_entity_fields(&point);
}

#[tokio::test]
async fn test_unparseable_body_is_decode_error() {
    let server = serve(200, vec![0xFF, 0xFE, 0x00, 0x01]).await;
    let writer = Arc::new(RecordingWriter::default());

    pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_secs(30)))
        .await
        .unwrap();

    let point = writer.single();
    assert_eq!(point.fields.status_code, Some(200));
    assert_eq!(point.fields.response_size_bytes, Some(4));
    assert!(point.fields.error.as_deref().unwrap().starts_with("Decode error"));
    assert_no_entity_fields(&point);
}

#[tokio::test]
async fn test_empty_feed_has_zero_counts_and_no_ages() {
    let server = serve(200, feed(None, vec![])).await;
    let writer = Arc::new(RecordingWriter::default());

    pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_secs(30)))
        .await
        .unwrap();

    let f = writer.single().fields;
    assert_eq!(f.entity_count, Some(0));
    assert_eq!(f.trip_update_count, Some(0));
    assert_eq!(f.vehicle_position_count, Some(0));
    assert_eq!(f.alert_count, Some(0));
    assert_eq!(f.header_ts_age_ms, None);
    assert_eq!(f.entity_timestamp_ages_min_ms, None);
    assert_eq!(f.entity_timestamp_ages_max_ms, None);
    assert_eq!(f.entity_timestamp_ages_avg_ms, None);
    assert_eq!(f.error, None);
}

#[tokio::test]
async fn test_timeout_writes_error_only_point() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let writer = Arc::new(RecordingWriter::default());

    // 400ms interval -> 200ms fetch timeout
    pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_millis(400)))
        .await
        .unwrap();

    let point = writer.single();
    assert_eq!(point.fields.status_code, None);
    assert_eq!(point.fields.response_time_ms, None);
    assert_eq!(point.fields.response_size_bytes, None);
    assert_no_entity_fields(&point);
    assert!(point.fields.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_write_failure_escapes_tick() {
    let server = serve(200, feed(None, vec![])).await;
    let writer = Arc::new(RecordingWriter {
        fail: true,
        ..Default::default()
    });

    let err = pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_secs(30)))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Write(_)));
    assert!(writer.points.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_point_time_is_tick_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(feed(None, vec![]))
                .set_delay(Duration::from_millis(1200)),
        )
        .mount(&server)
        .await;
    let writer = Arc::new(RecordingWriter::default());

    let before = Utc::now();
    pipeline(writer.clone())
        .run_tick(&job_for(&server, Duration::from_secs(10)))
        .await
        .unwrap();

    let point = writer.single();
    assert!(point.time >= before);
    assert!((point.time - before).num_milliseconds() < 1000);
}

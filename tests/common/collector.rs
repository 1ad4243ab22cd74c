//! In-process OTLP/gRPC collector.
//!
//! Accepts trace, metric and log exports on an ephemeral local port and keeps
//! what it received for assertions.

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

/// A log record as received by the collector.
#[derive(Debug, Clone)]
pub struct ReceivedLog {
    pub body: String,
    pub attribute_keys: Vec<String>,
}

#[derive(Debug, Default)]
struct Received {
    spans: Vec<String>,
    metrics: Vec<String>,
    logs: Vec<ReceivedLog>,
}

/// OTLP collector serving the trace, metrics and logs services.
#[derive(Clone, Default)]
pub struct MockCollector {
    received: Arc<Mutex<Received>>,
}

impl MockCollector {
    /// Start serving on `127.0.0.1`. Returns the collector and its endpoint URL.
    pub async fn start() -> (Self, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind collector");
        let addr = listener.local_addr().expect("collector has no address");
        let collector = Self::default();

        let server = tonic::transport::Server::builder()
            .add_service(TraceServiceServer::new(collector.clone()))
            .add_service(MetricsServiceServer::new(collector.clone()))
            .add_service(LogsServiceServer::new(collector.clone()))
            .serve_with_incoming(TcpListenerStream::new(listener));
        tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("collector stopped: {e}");
            }
        });

        (collector, format!("http://{addr}"))
    }

    /// Names of all received spans.
    pub fn span_names(&self) -> Vec<String> {
        self.received.lock().unwrap().spans.clone()
    }

    /// Names of all received metrics, one entry per export.
    pub fn metric_names(&self) -> Vec<String> {
        self.received.lock().unwrap().metrics.clone()
    }

    /// All received log records.
    pub fn logs(&self) -> Vec<ReceivedLog> {
        self.received.lock().unwrap().logs.clone()
    }
}

#[tonic::async_trait]
impl TraceService for MockCollector {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let names = request
            .into_inner()
            .resource_spans
            .into_iter()
            .flat_map(|resource| resource.scope_spans)
            .flat_map(|scope| scope.spans)
            .map(|span| span.name);
        self.received.lock().unwrap().spans.extend(names);

        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl MetricsService for MockCollector {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let names = request
            .into_inner()
            .resource_metrics
            .into_iter()
            .flat_map(|resource| resource.scope_metrics)
            .flat_map(|scope| scope.metrics)
            .map(|metric| metric.name);
        self.received.lock().unwrap().metrics.extend(names);

        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl LogsService for MockCollector {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let logs = request
            .into_inner()
            .resource_logs
            .into_iter()
            .flat_map(|resource| resource.scope_logs)
            .flat_map(|scope| scope.log_records)
            .map(|record| ReceivedLog {
                body: match record.body.and_then(|body| body.value) {
                    Some(Value::StringValue(body)) => body,
                    _ => String::new(),
                },
                attribute_keys: record.attributes.into_iter().map(|kv| kv.key).collect(),
            });
        self.received.lock().unwrap().logs.extend(logs);

        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: None,
        }))
    }
}

/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room runtime: intents in, effects out.
pub mod room_service;
/// Statistics updater and lookups.
pub mod stats_service;
/// Statistics store supervision with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;

//! Trading Gateway Bridge Client
//!
//! HTTP client for the JSON bridge in front of the local trading gateway.
//! One client is one session: it carries the market, trading environment,
//! security firm and optional account id that scope every request.

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::error::{GatewayError, GatewayResult};
use super::models::*;
use super::TradingGateway;
use crate::config::GatewayConfig;

/// Gateway bridge client bound to one trading session
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    market: TrdMarket,
    env: TrdEnv,
    security_firm: SecurityFirm,
    acc_id: Option<u64>,
}

impl GatewayClient {
    /// Create a client for the configured market without checking connectivity
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::connection("client_build", e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            market: config.market,
            env: config.env,
            security_firm: config.security_firm,
            acc_id: None,
        })
    }

    /// Create a client and verify the gateway answers
    pub async fn connect(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Self::new(config)?;
        client.check_connection().await?;
        Ok(client)
    }

    /// Same connection, scoped to another market
    pub fn for_market(&self, market: TrdMarket) -> Self {
        Self {
            market,
            ..self.clone()
        }
    }

    /// Same connection, scoped to one account
    pub fn for_account(&self, acc_id: u64) -> Self {
        Self {
            acc_id: Some(acc_id),
            ..self.clone()
        }
    }

    /// Human-readable session scope, e.g. `HK/REAL#281756` or `US/SIMULATE`
    pub fn label(&self) -> String {
        match self.acc_id {
            Some(id) => format!("{}/{}#{}", self.market, self.env, id),
            None => format!("{}/{}", self.market, self.env),
        }
    }

    /// Ping the gateway's global state endpoint
    pub async fn check_connection(&self) -> GatewayResult<()> {
        info!("Connecting to trading gateway at {}...", self.base_url);
        let _: serde_json::Value = self
            .send("get_global_state", self.client.get(self.url("/global_state")))
            .await?
            .unwrap_or_default();
        info!("Trading gateway reachable ({})", self.label());
        Ok(())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Query parameters that scope every request to this session
    fn scope_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("trd_market", self.market.to_string()),
            ("trd_env", self.env.to_string()),
            ("security_firm", self.security_firm.to_string()),
        ];
        if let Some(acc_id) = self.acc_id {
            params.push(("acc_id", acc_id.to_string()));
        }
        params
    }

    /// Send a request and unwrap the `{ret, data, msg}` envelope
    async fn send<R: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> GatewayResult<Option<R>> {
        let response = request
            .query(&self.scope_params())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(op, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::from_transport(op, e))?;

        if !status.is_success() {
            return Err(GatewayError::query(op, format!("HTTP {}: {}", status, body)));
        }

        let envelope: Envelope<R> =
            serde_json::from_str(&body).map_err(|e| GatewayError::decode(op, e.to_string()))?;

        if envelope.ret != RET_OK {
            return Err(GatewayError::query(
                op,
                envelope
                    .msg
                    .unwrap_or_else(|| format!("ret {}", envelope.ret)),
            ));
        }

        Ok(envelope.data)
    }

    async fn get<R: DeserializeOwned>(
        &self,
        op: &'static str,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> GatewayResult<R> {
        debug!("GET {} {:?}", endpoint, params);
        let request = self.client.get(self.url(endpoint)).query(params);
        self.send(op, request)
            .await?
            .ok_or_else(|| GatewayError::decode(op, "response carried no data"))
    }

    async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        op: &'static str,
        endpoint: &str,
        body: &T,
    ) -> GatewayResult<Option<R>> {
        debug!("POST {}", endpoint);
        let request = self
            .client
            .post(self.url(endpoint))
            .header("Content-Type", "application/json")
            .json(body);
        self.send(op, request).await
    }
}

impl TradingGateway for GatewayClient {
    async fn query_account_info(&self) -> GatewayResult<AccountInfo> {
        // The bridge answers with a one-row table
        let mut rows: Vec<AccountInfo> = self.get("accinfo_query", "/trade/accinfo", &[]).await?;
        if rows.is_empty() {
            return Err(GatewayError::decode("accinfo_query", "empty account table"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn query_position_list(&self, code: Option<&str>) -> GatewayResult<Vec<PositionRecord>> {
        let params: Vec<(&str, String)> = code
            .map(|c| vec![("code", c.to_string())])
            .unwrap_or_default();
        self.get("position_list_query", "/trade/position_list", &params)
            .await
    }

    async fn list_accounts(&self) -> GatewayResult<Vec<TradeAccount>> {
        self.get("get_acc_list", "/trade/acc_list", &[]).await
    }

    async fn unlock_trade(&self, password: &str) -> GatewayResult<()> {
        let body = serde_json::json!({ "password": password, "is_unlock": true });
        let _: Option<serde_json::Value> = self.post("unlock_trade", "/trade/unlock", &body).await?;
        Ok(())
    }

    async fn get_market_snapshot(&self, codes: &[String]) -> GatewayResult<Vec<MarketSnapshot>> {
        self.get(
            "get_market_snapshot",
            "/quote/market_snapshot",
            &[("code", codes.join(","))],
        )
        .await
    }

    async fn get_order_book(&self, code: &str, depth: u32) -> GatewayResult<OrderBook> {
        self.get(
            "get_order_book",
            "/quote/order_book",
            &[("code", code.to_string()), ("num", depth.to_string())],
        )
        .await
    }

    async fn query_trading_info(
        &self,
        query: &TradingInfoQuery,
    ) -> GatewayResult<MaxTradeQuantities> {
        let mut rows: Vec<MaxTradeQuantities> = self
            .get(
                "acctradinginfo_query",
                "/trade/acctradinginfo",
                &[
                    ("order_type", query.order_type.to_string()),
                    ("code", query.code.clone()),
                    ("price", query.price.to_string()),
                ],
            )
            .await?;
        if rows.is_empty() {
            return Err(GatewayError::decode("acctradinginfo_query", "empty trading info table"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> GatewayResult<PlacedOrder> {
        info!(
            "Placing order: {} {} {} @ {:.3} ({})",
            request.trd_side, request.qty, request.code, request.price, request.order_type
        );
        let order: Option<PlacedOrder> = self
            .post("place_order", "/trade/place_order", request)
            .await?;
        let order = order.ok_or_else(|| GatewayError::decode("place_order", "no order returned"))?;
        info!("Order placed: ID {}", order.order_id);
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Bridge stub answering a single request with a canned response.
    /// Yields the client and the raw request head it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (GatewayClient, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (head_tx, head_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let _ = head_tx.send(String::from_utf8_lossy(&request).into_owned());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let config = GatewayConfig {
            port,
            ..Default::default()
        };
        (GatewayClient::new(&config).unwrap(), head_rx)
    }

    #[test]
    fn test_scope_params() {
        let client = GatewayClient::new(&GatewayConfig::default()).unwrap();
        let params = client.scope_params();

        assert!(params.contains(&("trd_market", "HK".to_string())));
        assert!(params.contains(&("trd_env", "REAL".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "acc_id"));

        let scoped = client.for_account(281756);
        assert!(scoped
            .scope_params()
            .contains(&("acc_id", "281756".to_string())));
    }

    #[test]
    fn test_session_label() {
        let client = GatewayClient::new(&GatewayConfig::default()).unwrap();
        assert_eq!(client.label(), "HK/REAL");
        assert_eq!(client.for_market(TrdMarket::US).for_account(7).label(), "US/REAL#7");
        assert_eq!(client.url("/trade/accinfo"), "http://127.0.0.1:11111/trade/accinfo");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_connection_failure() {
        // Port 1 on loopback is never a gateway
        let config = GatewayConfig {
            port: 1,
            ..Default::default()
        };
        let client = GatewayClient::new(&config).unwrap();
        let err = client.query_account_info().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_position_list_through_bridge() {
        let (client, head) = serve_once(
            "200 OK",
            r#"{"ret": 0, "data": [
                {"code": "HK.09618", "position_side": "LONG", "qty": 200, "can_sell_qty": 200},
                {"code": "HK.09618", "position_side": "SHORT", "qty": 100, "can_sell_qty": "N/A"}
            ]}"#,
        )
        .await;

        let rows = client
            .for_account(281756)
            .query_position_list(Some("HK.09618"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].position_side, PositionSide::Short);
        assert_eq!(rows[1].can_sell_qty, 0.0);

        let head = head.await.unwrap();
        assert!(head.starts_with("GET /trade/position_list?"), "{}", head);
        assert!(head.contains("code=HK.09618"));
        assert!(head.contains("trd_market=HK"));
        assert!(head.contains("trd_env=REAL"));
        assert!(head.contains("acc_id=281756"));
    }

    #[tokio::test]
    async fn test_account_info_takes_first_row() {
        let (client, _head) = serve_once(
            "200 OK",
            r#"{"ret": 0, "data": [{"cash": 1500.0, "power": "N/A", "currency": "HKD"}]}"#,
        )
        .await;

        let info = client.query_account_info().await.unwrap();
        assert_eq!(info.cash, Some(1500.0));
        assert_eq!(info.power, None);
        assert_eq!(info.currency.as_deref(), Some("HKD"));
    }

    #[tokio::test]
    async fn test_empty_account_table_is_decode_failure() {
        let (client, _head) = serve_once("200 OK", r#"{"ret": 0, "data": []}"#).await;

        let err = client.query_account_info().await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode { op: "accinfo_query", .. }), "{}", err);
    }

    #[tokio::test]
    async fn test_rejected_call_carries_gateway_message() {
        let (client, _head) =
            serve_once("200 OK", r#"{"ret": -1, "msg": "Unlock trade first"}"#).await;

        match client.query_position_list(None).await {
            Err(GatewayError::Query { op, message }) => {
                assert_eq!(op, "position_list_query");
                assert_eq!(message, "Unlock trade first");
            }
            other => panic!("expected query failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_status_is_query_failure() {
        let (client, _head) = serve_once("500 Internal Server Error", "bridge down").await;

        let err = client.list_accounts().await.unwrap_err();
        assert!(matches!(err, GatewayError::Query { .. }), "{}", err);
        assert!(err.to_string().contains("500"));
        assert!(!err.is_connection());
    }

    #[tokio::test]
    async fn test_missing_data_is_decode_failure() {
        let (client, _head) = serve_once("200 OK", r#"{"ret": 0}"#).await;

        let err = client.list_accounts().await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode { .. }), "{}", err);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_failure() {
        let (client, _head) = serve_once("200 OK", r#"{"ret": 0, "data": {"rows": 3}}"#).await;

        let err = client.query_position_list(None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode { .. }), "{}", err);
    }
}

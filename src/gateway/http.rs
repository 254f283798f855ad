//! HTTP implementation of the backend gateway.
//!
//! Request construction follows the mobile app's web channel: the header
//! set below (app version, user agent, referer) is what the service
//! expects and is preserved verbatim.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::types::{
    AuthPayload, ChildContext, ClassDetail, ClassInfo, ClassMember, Envelope, QrTicket,
    RecordSummary, ScoreDetailBody, ScoreEntry,
};
use super::{Backend, GatewayError, LoginPoll};

const API_BASE: &str = "https://a.welife001.com";
const SERVICE_BASE: &str = "https://service.banjixiaoguanjia.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0";

/// The backend distinguishes "ticket not scanned yet" from real failures
/// only by this literal message. Any other wording is treated as a
/// terminal login failure, so this constant is tightly coupled to the
/// service's exact response text.
const UNSCANNED_STATUS: &str = "未扫码";

/// How each request authenticates.
enum Auth<'a> {
    /// Unauthenticated (the two login endpoints).
    None,
    /// Session token in the `authorization` header.
    Token(&'a str),
    /// Secondary identity token in the `imprint` header (score detail
    /// only).
    Imprint(&'a str),
}

/// HTTP gateway to the class-manager backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    api_base: String,
    service_base: String,
}

impl HttpGateway {
    /// Create a gateway against the production hosts.
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_bases(API_BASE.to_string(), SERVICE_BASE.to_string())
    }

    /// Create a gateway against explicit hosts (stub servers in tests).
    pub fn with_bases(api_base: String, service_base: String) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(Self::default_headers())
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            client,
            api_base,
            service_base,
        })
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.insert(
            "accept-language",
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6"),
        );
        headers.insert("app-info", HeaderValue::from_static("1/3.0.8/734"));
        headers.insert("cache-control", HeaderValue::from_static("no-cache"));
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(
            "sec-ch-ua",
            HeaderValue::from_static(
                "\"Not A(Brand\";v=\"8\", \"Chromium\";v=\"132\", \"Microsoft Edge\";v=\"132\"",
            ),
        );
        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
        headers.insert(
            "referer",
            HeaderValue::from_static("https://service.banjixiaoguanjia.com/"),
        );
        headers
    }

    /// POST a JSON body and parse the response envelope.
    async fn post_envelope<B, T>(
        &self,
        url: String,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<Envelope<T>, GatewayError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!(url = %url, "POST");

        let mut request = self.client.post(&url).json(body);
        request = match auth {
            Auth::None => request,
            Auth::Token(token) => request.header(AUTHORIZATION, token),
            Auth::Imprint(imprint) => request.header("imprint", imprint),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(GatewayError::Serialization)
    }

    /// POST and unwrap the envelope's `data`, erroring when it is absent.
    async fn post_data<B, T>(
        &self,
        url: String,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<T, GatewayError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let envelope: Envelope<T> = self.post_envelope(url, body, auth).await?;
        envelope
            .data
            .ok_or_else(|| GatewayError::Malformed("response envelope has no data".to_string()))
    }
}

#[async_trait]
impl Backend for HttpGateway {
    async fn qr_ticket(&self) -> Result<QrTicket, GatewayError> {
        self.post_data(
            format!("{}/app/auth/getQrCodeImg", self.api_base),
            &AuthPayload::new(None),
            Auth::None,
        )
        .await
    }

    async fn poll_login(&self, nonce: &str) -> Result<LoginPoll, GatewayError> {
        let envelope: Envelope<String> = self
            .post_envelope(
                format!("{}/app/auth/checkLoginStatusWithToken", self.api_base),
                &AuthPayload::new(Some(nonce)),
                Auth::None,
            )
            .await?;

        if envelope.code == Some(1) {
            let token = envelope.data.ok_or_else(|| {
                GatewayError::Malformed("login success without a token".to_string())
            })?;
            return Ok(LoginPoll::Success(token));
        }

        match envelope.msg {
            Some(msg) if msg == UNSCANNED_STATUS => Ok(LoginPoll::NotScanned),
            Some(msg) => Ok(LoginPoll::Rejected(msg)),
            None => Ok(LoginPoll::Rejected("unknown login status".to_string())),
        }
    }

    async fn probe(&self, token: &str) -> Result<(), GatewayError> {
        // getUserChildInfoApp is the cheapest authenticated endpoint; the
        // body is discarded here.
        let _: ChildContext = self
            .post_data(
                format!("{}/app/getUserChildInfoApp", self.service_base),
                &serde_json::json!({}),
                Auth::Token(token),
            )
            .await?;
        Ok(())
    }

    async fn child_member_ids(&self, token: &str) -> Result<Vec<String>, GatewayError> {
        let context: ChildContext = self
            .post_data(
                format!("{}/app/getUserChildInfoApp", self.service_base),
                &serde_json::json!({}),
                Auth::Token(token),
            )
            .await?;
        Ok(context
            .child_list
            .into_iter()
            .map(|child| child.member_id)
            .collect())
    }

    async fn record_page(
        &self,
        token: &str,
        members: &[String],
        page: u32,
        size: u32,
    ) -> Result<Vec<RecordSummary>, GatewayError> {
        // The member separator is sent pre-encoded; the backend expects
        // the literal `%3A` in the query string.
        let url = format!(
            "{}/info/getParent?members={}&type=-1&date=-1&page={page}&size={size}&isRecent=false",
            self.api_base,
            members.join("%3A"),
        );
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let envelope: Envelope<Vec<RecordSummary>> =
            serde_json::from_str(&body).map_err(GatewayError::Serialization)?;
        envelope
            .data
            .ok_or_else(|| GatewayError::Malformed("record page has no data".to_string()))
    }

    async fn classes_by_members(
        &self,
        token: &str,
        members: &[String],
    ) -> Result<Vec<ClassInfo>, GatewayError> {
        self.post_data(
            format!("{}/applet/getClassByMemberId", self.api_base),
            &serde_json::json!({ "member_ids": members }),
            Auth::Token(token),
        )
        .await
    }

    async fn class_roster(&self, token: &str, cid: &str) -> Result<Vec<String>, GatewayError> {
        let detail: ClassDetail = self
            .post_data(
                format!("{}/applet/getClassById", self.api_base),
                &serde_json::json!({ "cid": cid }),
                Auth::Token(token),
            )
            .await?;
        Ok(detail
            .class
            .rosters
            .into_iter()
            .map(|roster| roster.name)
            .collect())
    }

    async fn class_members(
        &self,
        token: &str,
        cid: &str,
    ) -> Result<Vec<ClassMember>, GatewayError> {
        self.post_data(
            format!("{}/applet/getClassMemberList", self.api_base),
            &serde_json::json!({ "cid": cid }),
            Auth::Token(token),
        )
        .await
    }

    async fn student_score(
        &self,
        imprint: &str,
        score_id: &str,
        student: &str,
    ) -> Result<Vec<ScoreEntry>, GatewayError> {
        let body: ScoreDetailBody = self
            .post_data(
                format!("{}/getStudentScoreById", self.api_base),
                &serde_json::json!({ "id": score_id, "name": student }),
                Auth::Imprint(imprint),
            )
            .await?;
        Ok(body.student_score.score_detail)
    }
}

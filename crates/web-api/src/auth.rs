//! JWT 认证
//!
//! 只负责把 `Authorization: Bearer <jwt>` 解析为调用者身份；
//! 成员关系与角色校验由应用层的 `AccessGate` 完成。

use application::Caller;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use config::JwtConfig;
use domain::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 签发 token，签发方（登录服务）不在本仓库内，这里主要供运维脚本和测试使用
    pub fn generate_token(&self, user_id: UserId) -> Result<String, ApiError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.config.expiration_hours);
        let claims = Claims {
            user_id: user_id.into(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|err| {
            ApiError::internal_server_error(format!("token generation failed: {}", err))
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token 校验失败");
                ApiError::unauthorized("invalid token")
            })
    }

    /// 没有 Authorization 头时得到匿名调用者，由服务层拒绝；
    /// 头存在但格式或签名不对时直接返回 401
    pub fn caller_from_headers(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(Caller::Anonymous);
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("invalid authorization header format"))?;

        let claims = self.verify_token(token)?;
        Ok(Caller::User(UserId::from(claims.user_id)))
    }
}

use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod home_routes;
pub mod professional_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/usuarios", user_routes::router())
        .nest("/api/v1/profesionales", professional_routes::router())
        .nest("/api/v1/citas", appointment_routes::router())
        .nest("/api/v1", home_routes::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::hash_password;
    use crate::db::{MemoryStore, Store};
    use crate::models::{NewUser, Role};

    struct TestApp {
        router: Router,
        admin_token: String,
    }

    impl TestApp {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            store
                .create_user(NewUser {
                    name: "Admin Sistema".into(),
                    email: "admin@hospital.com".into(),
                    document: "12345678".into(),
                    password_hash: hash_password("admin123").unwrap(),
                    role: Role::Admin,
                })
                .await
                .unwrap();

            let router = router(AppState {
                store,
                session_ttl_hours: 1,
            });
            let mut app = TestApp {
                router,
                admin_token: String::new(),
            };
            app.admin_token = app.login("admin@hospital.com", "admin123").await;
            app
        }

        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(t) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
            }
            let body = match body {
                Some(v) => {
                    req = req.header(header::CONTENT_TYPE, "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .router
                .clone()
                .oneshot(req.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn login(&self, email: &str, password: &str) -> String {
            let (status, body) = self
                .call(
                    "POST",
                    "/api/v1/auth/login",
                    None,
                    Some(json!({ "email": email, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["data"]["access_token"].as_str().unwrap().to_string()
        }

        async fn register(&self, nombre: &str, email: &str, documento: &str) -> (StatusCode, Value) {
            self.call(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "nombre": nombre,
                    "email": email,
                    "documento": documento,
                    "password": "user123"
                })),
            )
            .await
        }

        async fn create_professional(&self, nombre: &str) -> i64 {
            let (status, body) = self
                .call(
                    "POST",
                    "/api/v1/profesionales",
                    Some(&self.admin_token),
                    Some(json!({
                        "nombre": nombre,
                        "especialidad": "cardiologia",
                        "telefono": "555-0001"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["data"]["id"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn register_twice_is_a_conflict() {
        let app = TestApp::new().await;

        let (status, body) = app.register("Juan Pérez", "juan@email.com", "87654321").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["usuario"]["role"], "usuario");

        let (status, body) = app.register("Juan Otro", "JUAN@email.com", "99999999").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "EMAIL_TAKEN");

        let (status, body) = app.register("Juan Otro", "otro@email.com", "87654321").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "DOCUMENT_TAKEN");

        let (_, users) = app.call("GET", "/api/v1/usuarios", Some(&app.admin_token), None).await;
        let juans = users["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|u| u["email"] == "juan@email.com")
            .count();
        assert_eq!(juans, 1);
    }

    #[tokio::test]
    async fn admin_cannot_demote_themselves() {
        let app = TestApp::new().await;
        let token = app.admin_token.clone();

        let (status, body) = app
            .call(
                "PATCH",
                "/api/v1/usuarios/1",
                Some(&token),
                Some(json!({ "role": "usuario" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (_, me) = app.call("GET", "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(me["data"]["role"], "admin");

        let (status, _) = app
            .call(
                "PATCH",
                "/api/v1/usuarios/1",
                Some(&token),
                Some(json!({ "role": "admin", "nombre": "Admin Principal" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_delete_user() {
        let app = TestApp::new().await;
        let token = app.admin_token.clone();

        let (status, body) = app
            .call(
                "POST",
                "/api/v1/usuarios",
                Some(&token),
                Some(json!({
                    "nombre": "María González",
                    "email": "maria@email.com",
                    "documento": "11223344",
                    "password": "user123"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].get("password").is_none());
        assert!(body["data"].get("password_hash").is_none());
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, _) = app
            .call("DELETE", &format!("/api/v1/usuarios/{id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, users) = app.call("GET", "/api/v1/usuarios", Some(&token), None).await;
        assert!(users["data"].as_array().unwrap().iter().all(|u| u["id"] != id));

        let (status, _) = app
            .call("DELETE", &format!("/api/v1/usuarios/{id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn authentication_and_roles_are_enforced() {
        let app = TestApp::new().await;

        let (status, body) = app.call("GET", "/api/v1/citas", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "SESSION_EXPIRED");

        let (status, body) = app
            .call(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "admin@hospital.com", "password": "wrong-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

        let (_, reg) = app.register("Juan Pérez", "juan@email.com", "87654321").await;
        let patient = reg["data"]["access_token"].as_str().unwrap().to_string();

        let (status, _) = app.call("GET", "/api/v1/usuarios", Some(&patient), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app
            .call(
                "POST",
                "/api/v1/profesionales",
                Some(&patient),
                Some(json!({ "nombre": "X", "especialidad": "pediatria", "telefono": "1" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, home) = app.call("GET", "/api/v1/home", Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(home["data"]["sections"], json!(["citas"]));
        assert_eq!(home["data"]["estados_permitidos"], json!(["confirmada", "cancelada"]));
    }

    #[tokio::test]
    async fn admin_booking_is_enriched() {
        let app = TestApp::new().await;
        let pro = app.create_professional("Dr. Carlos Rodríguez").await;
        let (_, reg) = app.register("Juan Pérez", "juan@email.com", "87654321").await;
        let juan_id = reg["data"]["usuario"]["id"].as_i64().unwrap();

        let (status, body) = app
            .call(
                "POST",
                "/api/v1/citas",
                Some(&app.admin_token),
                Some(json!({
                    "fecha": "2026-02-05",
                    "hora": "09:00",
                    "estado": "pendiente",
                    "profesionalId": pro,
                    "usuarioId": juan_id
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let cita = &body["data"];
        assert_eq!(cita["id"], 1);
        assert_eq!(cita["hora"], "09:00");
        assert_eq!(cita["profesionalNombre"], "Dr. Carlos Rodríguez");
        assert_eq!(cita["profesionalEspecialidad"], "cardiologia");
        assert_eq!(cita["usuarioNombre"], "Juan Pérez");

        let (status, body) = app
            .call(
                "PATCH",
                "/api/v1/citas/1",
                Some(&app.admin_token),
                Some(json!({ "estado": "confirmada" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["estado"], "confirmada");
        assert_eq!(body["data"]["profesionalId"], pro);
        assert_eq!(body["data"]["usuarioId"], juan_id);

        let (status, _) = app
            .call("DELETE", &format!("/api/v1/profesionales/{pro}"), Some(&app.admin_token), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn patient_bookings_are_scoped_to_the_patient() {
        let app = TestApp::new().await;
        let pro = app.create_professional("Dra. Ana Martínez").await;
        let (_, juan) = app.register("Juan Pérez", "juan@email.com", "87654321").await;
        let (_, maria) = app.register("María González", "maria@email.com", "11223344").await;
        let juan_token = juan["data"]["access_token"].as_str().unwrap().to_string();
        let juan_id = juan["data"]["usuario"]["id"].as_i64().unwrap();
        let maria_id = maria["data"]["usuario"]["id"].as_i64().unwrap();
        let maria_token = maria["data"]["access_token"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(
                "POST",
                "/api/v1/citas",
                Some(&juan_token),
                Some(json!({
                    "fecha": "2026-02-06",
                    "hora": "14:00",
                    "profesionalId": pro,
                    "usuarioId": maria_id
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["usuarioId"], juan_id);
        assert_eq!(body["data"]["estado"], "confirmada");
        let cita_id = body["data"]["id"].as_i64().unwrap();

        let (_, list) = app.call("GET", "/api/v1/citas", Some(&maria_token), None).await;
        assert!(list["data"].as_array().unwrap().is_empty());

        let (status, _) = app
            .call("DELETE", &format!("/api/v1/citas/{cita_id}"), Some(&maria_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, list) = app
            .call("GET", "/api/v1/citas?estado=confirmada", Some(&juan_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["data"].as_array().unwrap().len(), 1);

        let (status, _) = app
            .call("GET", "/api/v1/citas?estado=archivada", Some(&juan_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call("GET", &format!("/api/v1/usuarios/{juan_id}/citas"), Some(&maria_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn logout_revokes_the_session() {
        let app = TestApp::new().await;
        let token = app.login("admin@hospital.com", "admin123").await;

        let (status, me) = app.call("GET", "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["data"]["role"], "admin");

        let (status, _) = app.call("POST", "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.call("GET", "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // other sessions of the same account are untouched
        let (status, _) = app.call("GET", "/api/v1/auth/me", Some(&app.admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

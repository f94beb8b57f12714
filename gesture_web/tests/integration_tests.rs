use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};

use axum::{routing::get, Json, Router};
use common::{Gesture, GestureReport};
use gesture_web::{router, ProxyError, Upstream};

type Error = Box<dyn std::error::Error>;

fn serve(app: Router) -> Result<SocketAddr, Error> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    let server = axum::Server::from_tcp(listener)?.serve(app.into_make_service());
    tokio::spawn(server);

    Ok(addr)
}

/// Address on which nothing listens.
fn unused_addr() -> Result<SocketAddr, Error> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?)
}

#[tokio::test]
async fn proxies_gesture_of_upstream() -> Result<(), Error> {
    let upstream_app = Router::new().route(
        "/gesture",
        get(|| async { Json(GestureReport::from(Some(Gesture::Point))) }),
    );
    let upstream_addr = serve(upstream_app)?;

    let upstream = Upstream::new(&format!("http://{upstream_addr}/"));
    let addr = serve(router(Arc::new(upstream)))?;

    let resp = reqwest::get(format!("http://{addr}/gesture")).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let report: GestureReport = resp.json().await?;
    assert_eq!(report.gesture(), Some(Gesture::Point));

    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_is_an_error() -> Result<(), Error> {
    let upstream = Upstream::new(&format!("http://{}", unused_addr()?));
    let addr = serve(router(Arc::new(upstream)))?;

    let resp = reqwest::get(format!("http://{addr}/gesture")).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: ProxyError = resp.json().await?;
    assert_eq!(body.error, "Failed to fetch gesture data");

    Ok(())
}

#[tokio::test]
async fn index_embeds_video_feed() -> Result<(), Error> {
    let upstream = Upstream::new("http://camera.local:5000");
    let addr = serve(router(Arc::new(upstream)))?;

    let page = reqwest::get(format!("http://{addr}/")).await?.text().await?;
    assert!(page.contains(r#"<img src="http://camera.local:5000/video_feed""#));

    let upstream = Upstream::new("http://camera.local:5000")
        .with_video_feed_url("http://192.168.1.20:5000/video_feed");
    let addr = serve(router(Arc::new(upstream)))?;

    let page = reqwest::get(format!("http://{addr}/")).await?.text().await?;
    assert!(page.contains(r#"<img src="http://192.168.1.20:5000/video_feed""#));

    Ok(())
}

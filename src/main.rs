#[macro_use]
extern crate rocket;

use mail_search::rocket as build_rocket;

#[launch]
async fn rocket() -> _ {
    build_rocket().await
}

#[rocket::launch]
fn rocket() -> _ {
    let rocket = import_server::rocket();
    log::info!("Starting import server");
    rocket
}

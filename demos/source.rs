use gsq::{registry, GsqErr};

fn main() -> Result<(), GsqErr> {
    let mut query = registry::create("tf2", "www.example.com", 27015)?;

    if query.query_server(true, true) {
        println!("{}", query.info());
    } else {
        println!("offline: {}", query.errstr().unwrap_or_default());
    }

    Ok(())
}

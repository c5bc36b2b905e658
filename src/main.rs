fn main() {
    hygiene::cli::run();
}

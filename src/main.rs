fn main() {
    codetrial::cli::run();
}

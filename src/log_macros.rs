/// Write a decoded card, a status line, or any other regular output to the logger
#[macro_export]
macro_rules! output {
  ($log: expr, $($args: tt)+) => {
    $log.output(format_args!($($args)+))
  };
}

/// Write a recoverable problem to the `warning` method of a logger
#[macro_export]
macro_rules! warning {
  ($log: expr, $($args: tt)+) => {
    $log.warning(format_args!($($args)+))
  };
}

/// Write a fatal problem to the `error` method of a logger
#[macro_export]
macro_rules! error {
  ($log: expr, $($args: tt)+) => {
    $log.error(format_args!($($args)+))
  };
}

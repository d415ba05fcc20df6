use core::cell::UnsafeCell;

/// An MMIO register which can only be read from.
#[repr(transparent)]
pub struct ReadOnly<T: Copy>(UnsafeCell<T>);

/// An MMIO register which may be both read and written.
#[repr(transparent)]
pub struct Volatile<T: Copy>(UnsafeCell<T>);

impl<T: Copy> ReadOnly<T> {
    /// volatile read
    pub fn vread(&self) -> T {
        unsafe { core::ptr::read_volatile(self.0.get()) }
    }
}

impl<T: Copy> Volatile<T> {
    pub fn read(&self) -> T {
        unsafe { core::ptr::read_volatile(self.0.get()) }
    }

    pub fn write(&self, value: T) {
        unsafe {
            core::ptr::write_volatile(self.0.get(), value);
        }
    }
}
